use crate::collector::CollectorSettings;
use crate::error::{AgentError, Result};
use doppler_common::id::local_hostname;
use doppler_provider::runner::RunnerOptions;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/doppler-agent.toml";
pub const DEFAULT_ENDPOINT: &str = "http://notify.doppler.io/";

pub const ENV_API_KEY: &str = "DOPPLER_API_KEY";
pub const ENV_ENDPOINT: &str = "DOPPLER_ENDPOINT";
pub const ENV_HOSTNAME: &str = "DOPPLER_HOSTNAME";

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Overrides the hostname reported by the OS
    pub hostname: Option<String>,
    #[serde(default = "default_send_interval")]
    pub send_interval_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    /// Per-store sample limit; the oldest samples are dropped beyond it
    #[serde(default = "default_max_store_samples")]
    pub max_store_samples: usize,
    /// Undelivered points older than this are dropped from the payload
    pub max_payload_age_secs: Option<u64>,
    #[serde(default)]
    pub disabled_providers: Vec<String>,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_send_interval() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    10
}

fn default_command_timeout() -> u64 {
    30
}

fn default_max_store_samples() -> usize {
    100_000
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: default_endpoint(),
            hostname: None,
            send_interval_secs: default_send_interval(),
            request_timeout_secs: default_request_timeout(),
            command_timeout_secs: default_command_timeout(),
            max_store_samples: default_max_store_samples(),
            max_payload_age_secs: None,
            disabled_providers: Vec::new(),
        }
    }
}

impl AgentConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load an explicitly given file, which must exist, or else the default
    /// path if present, or else the built-in defaults.
    pub fn load_or_default(path: Option<&str>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::load(DEFAULT_CONFIG_PATH),
            None => Ok(Self::default()),
        }
    }

    /// Apply `DOPPLER_*` environment overrides.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`; empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(api_key) = lookup(ENV_API_KEY) {
            self.api_key = api_key;
        }
        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            self.endpoint = endpoint;
        }
        if let Some(hostname) = lookup(ENV_HOSTNAME) {
            self.hostname = Some(hostname);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(AgentError::InvalidConfig(format!(
                "api_key is required (set it in the config file or {ENV_API_KEY})"
            )));
        }
        if self.endpoint.trim().is_empty() {
            return Err(AgentError::InvalidConfig("endpoint must not be empty".to_string()));
        }
        if self.send_interval_secs == 0 {
            return Err(AgentError::InvalidConfig(
                "send_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 || self.command_timeout_secs == 0 {
            return Err(AgentError::InvalidConfig(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Configured hostname, else the OS hostname, else `localhost`.
    pub fn hostname(&self) -> String {
        self.hostname
            .clone()
            .or_else(local_hostname)
            .unwrap_or_else(|| "localhost".to_string())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn collector_settings(&self) -> CollectorSettings {
        CollectorSettings {
            send_interval: Duration::from_secs(self.send_interval_secs),
            max_store_samples: (self.max_store_samples > 0).then_some(self.max_store_samples),
            max_payload_age: self.max_payload_age_secs.map(Duration::from_secs),
            runner: RunnerOptions {
                command_timeout: Duration::from_secs(self.command_timeout_secs),
            },
        }
    }
}
