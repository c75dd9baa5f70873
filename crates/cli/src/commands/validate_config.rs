//! `gosuto validate-config` — offline schema validation for a config file,
//! without starting the server or touching any running agent.

use gosuto_config::Config;
use std::path::Path;

pub async fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = std::fs::read(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;

    match Config::parse(&bytes) {
        Ok(config) => {
            println!(
                "{} is valid ({} gateway(s), {} mcp(s))",
                path.display(),
                config.gateways.len(),
                config.mcps.len()
            );
            Ok(())
        }
        Err(e) => Err(format!("{}: {e}", path.display()).into()),
    }
}
