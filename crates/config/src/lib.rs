//! Declarative configuration pushed by the orchestrator via `POST /config/apply`.
//!
//! `Config` is parsed from YAML and validated structurally: the validator
//! never resolves references (it doesn't check that a capability's `mcp`
//! exists, for instance) — it only checks the shape and the cross-field
//! rules spelled out in [`Config::validate`].

pub mod runtime;

use gosuto_core::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub use runtime::{RuntimeSettings, RuntimeSettingsError};

const API_VERSION: &str = "gosuto/v1";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub trust: Trust,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    #[serde(default)]
    pub mcps: Vec<Mcp>,
    #[serde(default)]
    pub gateways: Vec<Gateway>,
    #[serde(default)]
    pub secrets: Vec<Secret>,
    #[serde(default)]
    pub persona: Persona,
    #[serde(default)]
    pub instructions: Instructions,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Trust {
    #[serde(default, rename = "allowedRooms")]
    pub allowed_rooms: Vec<String>,
    #[serde(default, rename = "allowedSenders")]
    pub allowed_senders: Vec<String>,
    #[serde(default, rename = "requireE2EE")]
    pub require_e2ee: bool,
    #[serde(default, rename = "adminRoom", skip_serializing_if = "Option::is_none")]
    pub admin_room: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limits {
    #[serde(default, rename = "maxRequestsPerMinute")]
    pub max_requests_per_minute: u32,
    #[serde(default, rename = "maxTokensPerRequest")]
    pub max_tokens_per_request: u32,
    #[serde(default, rename = "maxConcurrentRequests")]
    pub max_concurrent_requests: u32,
    #[serde(default, rename = "maxMonthlyCostUSD")]
    pub max_monthly_cost_usd: f64,
    #[serde(default, rename = "maxEventsPerMinute")]
    pub max_events_per_minute: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_requests_per_minute: 0,
            max_tokens_per_request: 0,
            max_concurrent_requests: 0,
            max_monthly_cost_usd: 0.0,
            max_events_per_minute: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Capability {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(default)]
    pub allow: bool,
    #[serde(default)]
    pub constraints: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Mcp {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default, rename = "autoRestart")]
    pub auto_restart: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Gateway {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub config: HashMap<String, String>,
    #[serde(default, rename = "autoRestart")]
    pub auto_restart: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Secret {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "envVar", skip_serializing_if = "Option::is_none")]
    pub env_var: Option<String>,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Persona {
    #[serde(default, rename = "systemPrompt")]
    pub system_prompt: String,
    #[serde(default, rename = "llmProvider", skip_serializing_if = "Option::is_none")]
    pub llm_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(
        default,
        rename = "apiKeySecretRef",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_key_secret_ref: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Instructions {
    #[serde(default)]
    pub workflow: Vec<WorkflowStep>,
    #[serde(default)]
    pub context: Context,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkflowStep {
    #[serde(default)]
    pub trigger: String,
    #[serde(default)]
    pub action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Context {
    #[serde(default)]
    pub peers: Vec<Peer>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Peer {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
}

impl Config {
    /// Decode YAML and run [`Config::validate`].
    pub fn parse(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Config =
            serde_yaml::from_slice(bytes).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Structural validation. Returns the first violation found, path-qualified.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |path: &str, message: &str| ConfigError::Invalid {
            path: path.to_string(),
            message: message.to_string(),
        };

        if self.api_version != API_VERSION {
            return Err(invalid(
                "apiVersion",
                &format!("must equal \"{API_VERSION}\", got {:?}", self.api_version),
            ));
        }
        if self.metadata.name.trim().is_empty() {
            return Err(invalid("metadata.name", "must not be empty"));
        }

        if self.trust.allowed_rooms.is_empty() {
            return Err(invalid("trust.allowedRooms", "must not be empty"));
        }
        for (i, room) in self.trust.allowed_rooms.iter().enumerate() {
            if room != "*" && !room.starts_with('!') {
                return Err(invalid(
                    &format!("trust.allowedRooms[{i}]"),
                    &format!("{room:?} must be \"*\" or start with \"!\""),
                ));
            }
        }
        if self.trust.allowed_senders.is_empty() {
            return Err(invalid("trust.allowedSenders", "must not be empty"));
        }
        for (i, sender) in self.trust.allowed_senders.iter().enumerate() {
            if sender != "*" && !sender.starts_with('@') {
                return Err(invalid(
                    &format!("trust.allowedSenders[{i}]"),
                    &format!("{sender:?} must be \"*\" or start with \"@\""),
                ));
            }
        }

        let limits = &self.limits;
        if limits.max_monthly_cost_usd < 0.0 {
            return Err(invalid(
                "limits.maxMonthlyCostUSD",
                "must be >= 0",
            ));
        }
        // The remaining limit fields are u32 and therefore cannot be negative.

        for (i, cap) in self.capabilities.iter().enumerate() {
            if cap.name.trim().is_empty() {
                return Err(invalid(
                    &format!("capabilities[{i}]"),
                    "name must not be empty",
                ));
            }
        }

        for (i, mcp) in self.mcps.iter().enumerate() {
            if mcp.name.trim().is_empty() {
                return Err(invalid(&format!("mcps[{i}]"), "name must not be empty"));
            }
            if mcp.command.trim().is_empty() {
                return Err(invalid(
                    &format!("mcps[{i}] ({:?})", mcp.name),
                    "command must not be empty",
                ));
            }
        }

        for (i, gw) in self.gateways.iter().enumerate() {
            if gw.name.trim().is_empty() {
                return Err(invalid(&format!("gateways[{i}]"), "name must not be empty"));
            }
            let has_type = !gw.kind.trim().is_empty();
            let has_command = !gw.command.trim().is_empty();
            if has_type == has_command {
                return Err(invalid(
                    &format!("gateways[{i}] ({:?})", gw.name),
                    "exactly one of type or command must be set",
                ));
            }
            if has_type {
                match gw.kind.as_str() {
                    "cron" => {
                        if !gw.config.contains_key("expression") {
                            return Err(invalid(
                                &format!("gateways[{i}] ({:?}).config", gw.name),
                                "cron gateways require config.expression",
                            ));
                        }
                    }
                    "webhook" => {
                        let auth_type = gw.config.get("authType").map(String::as_str);
                        if auth_type == Some("hmac-sha256")
                            && gw
                                .config
                                .get("hmacSecretRef")
                                .map(|s| s.trim().is_empty())
                                .unwrap_or(true)
                        {
                            return Err(invalid(
                                &format!("gateways[{i}] ({:?}).config", gw.name),
                                "webhook gateways with authType=hmac-sha256 require config.hmacSecretRef",
                            ));
                        }
                    }
                    other => {
                        return Err(invalid(
                            &format!("gateways[{i}] ({:?}).type", gw.name),
                            &format!("unknown gateway type {other:?}"),
                        ));
                    }
                }
            }
        }

        let mut names = HashSet::new();
        for mcp in &self.mcps {
            if !names.insert(mcp.name.clone()) {
                return Err(invalid(
                    "mcps[].name",
                    &format!("duplicate name {:?} (shared with gateways)", mcp.name),
                ));
            }
        }
        for gw in &self.gateways {
            if !names.insert(gw.name.clone()) {
                return Err(invalid(
                    "gateways[].name",
                    &format!("duplicate name {:?} (shared with mcps)", gw.name),
                ));
            }
        }

        for (i, secret) in self.secrets.iter().enumerate() {
            if secret.name.trim().is_empty() {
                return Err(invalid(&format!("secrets[{i}]"), "name must not be empty"));
            }
        }

        if let Some(t) = self.persona.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(invalid(
                    "persona.temperature",
                    &format!("{t} must lie in [0.0, 2.0]"),
                ));
            }
        }

        for (i, step) in self.instructions.workflow.iter().enumerate() {
            if step.trigger.trim().is_empty() {
                return Err(invalid(
                    &format!("instructions.workflow[{i}].trigger"),
                    "must not be empty",
                ));
            }
            if step.action.trim().is_empty() {
                return Err(invalid(
                    &format!("instructions.workflow[{i}].action"),
                    "must not be empty",
                ));
            }
        }
        for (i, peer) in self.instructions.context.peers.iter().enumerate() {
            if peer.name.trim().is_empty() {
                return Err(invalid(
                    &format!("instructions.context.peers[{i}].name"),
                    "must not be empty",
                ));
            }
            if peer.role.trim().is_empty() {
                return Err(invalid(
                    &format!("instructions.context.peers[{i}].role"),
                    "must not be empty",
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            api_version: API_VERSION.into(),
            metadata: Metadata {
                name: "demo-agent".into(),
                ..Default::default()
            },
            trust: Trust {
                allowed_rooms: vec!["*".into()],
                allowed_senders: vec!["@alice:example.org".into()],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn minimal_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn wrong_api_version_rejected() {
        let mut c = valid_config();
        c.api_version = "v0".into();
        let err = c.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { path, .. } if path == "apiVersion"));
    }

    #[test]
    fn blank_name_rejected() {
        let mut c = valid_config();
        c.metadata.name = "  ".into();
        assert!(c.validate().is_err());
    }

    #[test]
    fn allowed_room_must_start_with_bang() {
        let mut c = valid_config();
        c.trust.allowed_rooms = vec!["not-a-room".into()];
        let err = c.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { path, .. } if path == "trust.allowedRooms[0]"));
    }

    #[test]
    fn allowed_sender_must_start_with_at() {
        let mut c = valid_config();
        c.trust.allowed_senders = vec!["bob".into()];
        assert!(c.validate().is_err());
    }

    #[test]
    fn empty_trust_lists_rejected() {
        let mut c = valid_config();
        c.trust.allowed_rooms = vec![];
        assert!(c.validate().is_err());
    }

    #[test]
    fn duplicate_mcp_and_gateway_names_rejected() {
        let mut c = valid_config();
        c.mcps.push(Mcp {
            name: "dup".into(),
            command: "echo".into(),
            ..Default::default()
        });
        c.gateways.push(Gateway {
            name: "dup".into(),
            kind: "cron".into(),
            config: HashMap::from([("expression".into(), "* * * * *".into())]),
            ..Default::default()
        });
        let err = c.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { path, .. } if path == "gateways[].name"));
    }

    #[test]
    fn cron_gateway_without_expression_rejected() {
        let mut c = valid_config();
        c.gateways.push(Gateway {
            name: "scheduler".into(),
            kind: "cron".into(),
            ..Default::default()
        });
        assert!(c.validate().is_err());
    }

    #[test]
    fn webhook_hmac_without_secret_ref_rejected() {
        let mut c = valid_config();
        c.gateways.push(Gateway {
            name: "github".into(),
            kind: "webhook".into(),
            config: HashMap::from([("authType".into(), "hmac-sha256".into())]),
            ..Default::default()
        });
        assert!(c.validate().is_err());
    }

    #[test]
    fn webhook_with_hmac_secret_ref_accepted() {
        let mut c = valid_config();
        c.gateways.push(Gateway {
            name: "github".into(),
            kind: "webhook".into(),
            config: HashMap::from([
                ("authType".into(), "hmac-sha256".into()),
                ("hmacSecretRef".into(), "github.hmac-secret".into()),
            ]),
            ..Default::default()
        });
        assert!(c.validate().is_ok());
    }

    #[test]
    fn gateway_requires_exactly_one_of_type_or_command() {
        let mut c = valid_config();
        c.gateways.push(Gateway {
            name: "both".into(),
            kind: "cron".into(),
            command: "run.sh".into(),
            config: HashMap::from([("expression".into(), "* * * * *".into())]),
            ..Default::default()
        });
        assert!(c.validate().is_err());

        let mut c2 = valid_config();
        c2.gateways.push(Gateway {
            name: "neither".into(),
            ..Default::default()
        });
        assert!(c2.validate().is_err());
    }

    #[test]
    fn unknown_gateway_type_rejected() {
        let mut c = valid_config();
        c.gateways.push(Gateway {
            name: "mystery".into(),
            kind: "carrier-pigeon".into(),
            ..Default::default()
        });
        assert!(c.validate().is_err());
    }

    #[test]
    fn temperature_boundaries() {
        let mut c = valid_config();
        c.persona.temperature = Some(0.0);
        assert!(c.validate().is_ok());
        c.persona.temperature = Some(2.0);
        assert!(c.validate().is_ok());
        c.persona.temperature = Some(2.1);
        assert!(c.validate().is_err());
        c.persona.temperature = Some(-0.1);
        assert!(c.validate().is_err());
    }

    #[test]
    fn blank_workflow_fields_rejected() {
        let mut c = valid_config();
        c.instructions.workflow.push(WorkflowStep {
            trigger: "".into(),
            action: "notify".into(),
        });
        assert!(c.validate().is_err());
    }

    #[test]
    fn blank_peer_fields_rejected() {
        let mut c = valid_config();
        c.instructions.context.peers.push(Peer {
            name: "".into(),
            role: "reviewer".into(),
        });
        assert!(c.validate().is_err());
    }

    #[test]
    fn parse_rejects_malformed_yaml() {
        assert!(Config::parse(b": not: valid: yaml:").is_err());
    }

    #[test]
    fn parse_accepts_full_example() {
        let yaml = r#"
apiVersion: gosuto/v1
metadata:
  name: demo-agent
trust:
  allowedRooms: ["*"]
  allowedSenders: ["@alice:example.org"]
limits:
  maxEventsPerMinute: 30
gateways:
  - name: scheduler
    type: cron
    config:
      expression: "*/15 * * * *"
      payload: "tick"
"#;
        let config = Config::parse(yaml.as_bytes()).unwrap();
        assert_eq!(config.gateways.len(), 1);
        assert_eq!(config.limits.max_events_per_minute, 30);
    }
}
