//! Configuration management for lambda-ctl.
//!
//! Loads configuration from an optional TOML file with environment variable
//! overrides for the remote endpoint.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable overriding `remote.url`.
pub const ENV_URL: &str = "LAMBDA_CTL_URL";

/// Environment variable overriding `remote.token`.
pub const ENV_TOKEN: &str = "LAMBDA_CTL_TOKEN";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub log: LogConfig,

    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the lambda host
    #[serde(default = "default_url")]
    pub url: String,

    /// Bearer token sent with every request (empty = anonymous)
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// Seconds to wait after the first interrupt before forcing exit
    #[serde(default = "default_grace_secs")]
    pub grace_secs: u64,
}

// Default values
fn default_url() -> String {
    "http://127.0.0.1:3434".to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_grace_secs() -> u64 {
    5
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            token: String::new(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_secs: default_grace_secs(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise defaults; then apply env overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_URL).filter(|v| !v.is_empty()) {
            self.remote.url = url;
        }
        if let Some(token) = lookup(ENV_TOKEN) {
            self.remote.token = token;
        }
    }

    /// Token to forward to the remote host, if any.
    pub fn token(&self) -> Option<&str> {
        Some(self.remote.token.as_str()).filter(|t| !t.is_empty())
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.shutdown.grace_secs)
    }
}
