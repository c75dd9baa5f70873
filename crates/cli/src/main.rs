//! gosuto CLI — the main entry point.
//!
//! Commands:
//! - `serve`            — bind the ACP HTTP surface and the Gateway Manager
//! - `validate-config`  — offline schema validation of a config YAML file

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "gosuto",
    about = "gosuto — Agent Control Protocol gateway and cron reconciler",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bind the ACP HTTP surface and start the built-in cron Gateway Manager.
    Serve {
        /// Override the bind address from runtime settings (e.g. "0.0.0.0:8765").
        #[arg(long)]
        bind_addr: Option<String>,

        /// Override the bearer token from runtime settings.
        #[arg(long)]
        bearer_token: Option<String>,

        /// Path to the runtime settings TOML file (defaults to ~/.gosuto/runtime.toml).
        #[arg(long)]
        settings: Option<PathBuf>,

        /// Path to a config YAML file to apply at startup.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Validate a config YAML file offline, without starting the server.
    ValidateConfig {
        /// Path to the config YAML file.
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            bind_addr,
            bearer_token,
            settings,
            config,
        } => {
            commands::serve::run(commands::serve::ServeArgs {
                bind_addr,
                bearer_token,
                settings_path: settings,
                config_path: config,
            })
            .await
        }
        Commands::ValidateConfig { path } => commands::validate_config::run(&path).await,
    }
}
