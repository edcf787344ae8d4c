//! Runtime configuration.
//!
//! Values come from, in increasing precedence: built-in defaults, an optional
//! TOML file, and `TRIAGE_*` environment variables (a `.env` file is loaded
//! first when present).

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Root of the investigation repository and snapshots
    pub data_dir: PathBuf,
    /// Whole-agent time bound
    pub agent_timeout_secs: u64,
    /// Per-fetch time bound inside an agent
    pub fetch_timeout_secs: u64,
    /// Reasoning collaborator time bound
    pub reasoning_timeout_secs: u64,
    /// `tracing` filter directive
    pub log_filter: String,
    /// Pods the logs agent reads per run
    pub max_log_pods: usize,
    pub log_tail_lines: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".triage"),
            agent_timeout_secs: 30,
            fetch_timeout_secs: 10,
            reasoning_timeout_secs: 20,
            log_filter: "triage_agent=info,triage_core=info,triage_reasoning=info".to_string(),
            max_log_pods: 10,
            log_tail_lines: 200,
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::default().apply_env(|key| env::var(key).ok())
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()
    }

    /// TOML file overridden by the process environment.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)?.apply_env(|key| env::var(key).ok())
    }

    /// Apply `TRIAGE_*` overrides from `lookup`.
    pub fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(dir) = lookup("TRIAGE_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(filter) = lookup("TRIAGE_LOG") {
            self.log_filter = filter;
        }
        self.agent_timeout_secs = parse_or(&lookup, "TRIAGE_AGENT_TIMEOUT_SECS", self.agent_timeout_secs)?;
        self.fetch_timeout_secs = parse_or(&lookup, "TRIAGE_FETCH_TIMEOUT_SECS", self.fetch_timeout_secs)?;
        self.reasoning_timeout_secs =
            parse_or(&lookup, "TRIAGE_REASONING_TIMEOUT_SECS", self.reasoning_timeout_secs)?;
        self.max_log_pods = parse_or(&lookup, "TRIAGE_MAX_LOG_PODS", self.max_log_pods)?;
        self.log_tail_lines = parse_or(&lookup, "TRIAGE_LOG_TAIL_LINES", self.log_tail_lines)?;
        self.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        for (key, value) in [
            ("agent_timeout_secs", self.agent_timeout_secs),
            ("fetch_timeout_secs", self.fetch_timeout_secs),
            ("reasoning_timeout_secs", self.reasoning_timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: "0".to_string(),
                });
            }
        }
        Ok(self)
    }

    pub fn agent_timeout(&self) -> Duration {
        Duration::from_secs(self.agent_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn reasoning_timeout(&self) -> Duration {
        Duration::from_secs(self.reasoning_timeout_secs)
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
        None => Ok(default),
    }
}
