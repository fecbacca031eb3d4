//! Connection settings: defaults, environment, and TOML files.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 7497;
pub const DEFAULT_CLIENT_ID: i32 = 1;
pub const DEFAULT_TIMEOUT_SECS: f64 = 30.0;

pub const ENV_HOST: &str = "TWS_HOST";
pub const ENV_PORT: &str = "TWS_PORT";
pub const ENV_CLIENT_ID: &str = "TWS_CLIENT_ID";
pub const ENV_TIMEOUT: &str = "TWS_TIMEOUT_SECS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {var}: '{value}'")]
    InvalidEnv { var: &'static str, value: String },

    #[error("timeout_secs must be a non-negative number of seconds, got {0}")]
    InvalidTimeout(f64),
}

/// Where and how the client reaches the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub client_id: i32,
    /// Connect timeout in seconds, fractions allowed. Also used when
    /// `fetch` connects implicitly.
    pub timeout_secs: f64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            client_id: DEFAULT_CLIENT_ID,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `TWS_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(host) = lookup(ENV_HOST).filter(|h| !h.trim().is_empty()) {
            config.host = host.trim().to_string();
        }
        if let Some(port) = lookup(ENV_PORT) {
            config.port = parse_env(ENV_PORT, &port)?;
        }
        if let Some(id) = lookup(ENV_CLIENT_ID) {
            config.client_id = parse_env(ENV_CLIENT_ID, &id)?;
        }
        if let Some(secs) = lookup(ENV_TIMEOUT) {
            config.timeout_secs = parse_env(ENV_TIMEOUT, &secs)?;
            if check_timeout(config.timeout_secs).is_err() {
                return Err(ConfigError::InvalidEnv {
                    var: ENV_TIMEOUT,
                    value: secs,
                });
            }
        }
        Ok(config)
    }

    /// Parse a TOML document; missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        check_timeout(config.timeout_secs)?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_client_id(mut self, client_id: i32) -> Self {
        self.client_id = client_id;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs_f64();
        self
    }

    /// The timeout at millisecond resolution.
    pub fn timeout(&self) -> Duration {
        if check_timeout(self.timeout_secs).is_err() {
            return Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS);
        }
        Duration::from_millis((self.timeout_secs * 1000.0).round() as u64)
    }
}

fn check_timeout(secs: f64) -> Result<(), ConfigError> {
    if secs.is_finite() && secs >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidTimeout(secs))
    }
}

fn parse_env<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var,
        value: value.to_string(),
    })
}
