//! Process-local bootstrap settings, distinct from the orchestrator-pushed
//! [`crate::Config`]. Loaded once at startup from an optional TOML file with
//! environment-variable overrides, the same shape the orchestrator's own
//! `AppConfig::load` uses.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Empty = no bearer auth required (development only).
    #[serde(default)]
    pub bearer_token: String,

    #[serde(default)]
    pub direct_secret_push_enabled: bool,

    #[serde(default = "default_redeemer_timeout_secs")]
    pub redeemer_timeout_secs: u64,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8765".into()
}
fn default_redeemer_timeout_secs() -> u64 {
    10
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            bearer_token: String::new(),
            direct_secret_push_enabled: false,
            redeemer_timeout_secs: default_redeemer_timeout_secs(),
            log_level: default_log_level(),
        }
    }
}

impl RuntimeSettings {
    /// Load from `path`, falling back to defaults when the file is absent,
    /// then apply environment-variable overrides.
    pub fn load_from(path: &Path) -> Result<Self, RuntimeSettingsError> {
        let mut settings = if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| RuntimeSettingsError::Io {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
            toml::from_str(&content).map_err(|e| RuntimeSettingsError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        } else {
            tracing::info!(path = %path.display(), "no runtime settings file found, using defaults");
            Self::default()
        };

        if let Ok(v) = std::env::var("GOSUTO_BIND_ADDR") {
            settings.bind_addr = v;
        }
        if let Ok(v) = std::env::var("GOSUTO_BEARER_TOKEN") {
            settings.bearer_token = v;
        }
        if let Ok(v) = std::env::var("GOSUTO_DIRECT_SECRET_PUSH") {
            settings.direct_secret_push_enabled = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Ok(v) = std::env::var("GOSUTO_REDEEMER_TIMEOUT_SECS") {
            if let Ok(secs) = v.parse() {
                settings.redeemer_timeout_secs = secs;
            }
        }

        Ok(settings)
    }

    pub fn default_path() -> PathBuf {
        dirs_home().join(".gosuto").join("runtime.toml")
    }
}

fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeSettingsError {
    #[error("failed to read runtime settings at {path}: {reason}")]
    Io { path: PathBuf, reason: String },
    #[error("failed to parse runtime settings at {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_returns_defaults() {
        let settings = RuntimeSettings::load_from(Path::new("/nonexistent/runtime.toml")).unwrap();
        assert_eq!(settings.bind_addr, "127.0.0.1:8765");
        assert!(!settings.direct_secret_push_enabled);
    }

    #[test]
    fn parses_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runtime.toml");
        std::fs::write(
            &path,
            r#"
bind_addr = "0.0.0.0:9000"
bearer_token = "secret-token"
direct_secret_push_enabled = true
"#,
        )
        .unwrap();

        let settings = RuntimeSettings::load_from(&path).unwrap();
        assert_eq!(settings.bind_addr, "0.0.0.0:9000");
        assert_eq!(settings.bearer_token, "secret-token");
        assert!(settings.direct_secret_push_enabled);
    }

    #[test]
    fn malformed_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runtime.toml");
        std::fs::write(&path, "not = [valid").unwrap();
        assert!(RuntimeSettings::load_from(&path).is_err());
    }
}
