//! Process configuration.
//!
//! Loaded once at startup from `config.toml` under the scout config
//! directory, with `SCOUT_*` environment overrides on top. Everything has a
//! working default so a bare process starts without any file present.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

fn default_runtime_endpoint() -> String {
    "http://127.0.0.1:8700/v1/agents/run".to_string()
}

fn default_model() -> String {
    "gpt-4.1-mini".to_string()
}

fn default_clarification_timeout_secs() -> u64 {
    300
}

fn default_max_turns() -> usize {
    crate::orchestrator::DEFAULT_MAX_TURNS
}

fn default_port() -> u16 {
    3000
}

fn default_output_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("scout")
        .join("reports")
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoutConfig {
    /// Agent runtime service endpoint.
    #[serde(default = "default_runtime_endpoint")]
    pub runtime_endpoint: String,
    /// Model identifier forwarded to the runtime.
    #[serde(default = "default_model")]
    pub model: String,
    /// Seconds to wait for a human clarification answer.
    #[serde(default = "default_clarification_timeout_secs")]
    pub clarification_timeout_secs: u64,
    /// Iteration cap for the research loop.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    /// Server listen port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory for persisted reports and transcripts.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        toml::from_str("").expect("empty config uses field defaults")
    }
}

/// Config file location: `<config dir>/scout/config.toml`.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("scout")
        .join("config.toml")
}

impl ScoutConfig {
    /// Load from the config file if present, then apply env overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string(config_path()) {
            Ok(raw) => match toml::from_str(&raw) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("invalid config file, using defaults: {e}");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        };
        config.apply_env_overrides();
        config
    }

    pub fn clarification_timeout(&self) -> Duration {
        Duration::from_secs(self.clarification_timeout_secs)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(endpoint) = std::env::var("SCOUT_RUNTIME_ENDPOINT") {
            self.runtime_endpoint = endpoint;
        }
        if let Ok(model) = std::env::var("SCOUT_MODEL") {
            self.model = model;
        }
        if let Ok(secs) = std::env::var("SCOUT_CLARIFICATION_TIMEOUT_SECS") {
            match secs.parse() {
                Ok(secs) => self.clarification_timeout_secs = secs,
                Err(_) => tracing::warn!("ignoring invalid SCOUT_CLARIFICATION_TIMEOUT_SECS"),
            }
        }
        if let Ok(turns) = std::env::var("SCOUT_MAX_TURNS") {
            match turns.parse() {
                Ok(turns) => self.max_turns = turns,
                Err(_) => tracing::warn!("ignoring invalid SCOUT_MAX_TURNS"),
            }
        }
        if let Ok(port) = std::env::var("SCOUT_PORT") {
            match port.parse() {
                Ok(port) => self.port = port,
                Err(_) => tracing::warn!("ignoring invalid SCOUT_PORT"),
            }
        }
        if let Ok(dir) = std::env::var("SCOUT_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
    }
}
