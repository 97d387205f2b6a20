//! Configuration loading and typed config structures for the dashboard
//! relay.
//!
//! The configuration lives in a YAML file (`dfs-dashboard.yaml` by
//! default). Every section and field has a default, so an empty or
//! missing file yields a runnable configuration.

use std::path::Path;

use serde::Deserialize;

use crate::origin::OriginPolicy;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is not usable.
    #[error("invalid config value: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level dashboard configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DashboardConfig {
    /// Listener, identity, and origin policy.
    #[serde(default)]
    pub server: ServerConfig,

    /// Broadcast hub tuning.
    #[serde(default)]
    pub hub: HubConfig,

    /// Command gateway behavior.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DashboardConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override file values:
    /// - `DASHBOARD_HOST` overrides `server.host`
    /// - `DASHBOARD_PORT` overrides `server.port`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if it is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value fails validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Load from `path` if it exists, otherwise start from defaults.
    /// Environment overrides apply either way.
    ///
    /// # Errors
    ///
    /// Same as [`DashboardConfig::from_file`].
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Self::from_file(path);
        }
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value fails validation.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not to a mapping.
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `DASHBOARD_PORT` is not a port
    /// number.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the port override is not a port
    /// number.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("DASHBOARD_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("DASHBOARD_PORT") {
            self.server.port = port
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("DASHBOARD_PORT={port}: {e}")))?;
        }
        Ok(())
    }

    /// Check values that parse but cannot be used.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be non-zero".to_owned()));
        }
        if self.server.service_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "server.service_name must not be empty".to_owned(),
            ));
        }
        if self.hub.viewer_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "hub.viewer_queue_capacity must be at least 1".to_owned(),
            ));
        }
        OriginPolicy::from_origins(&self.server.allowed_origins)?;
        Ok(())
    }
}

/// Listener and identity settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// The host address to bind to (e.g. `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: String,

    /// The TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Service name reported by the health endpoint.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Origins allowed to call the HTTP API or open a viewer connection.
    /// `"*"` allows any origin.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            service_name: default_service_name(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

/// Broadcast hub settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HubConfig {
    /// Frames buffered per viewer before further frames are dropped for
    /// that viewer.
    #[serde(default = "default_viewer_queue_capacity")]
    pub viewer_queue_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            viewer_queue_capacity: default_viewer_queue_capacity(),
        }
    }
}

/// Command gateway settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GatewayConfig {
    /// Reject failure injections without a non-empty `type` and
    /// `kitchenId` instead of forwarding whatever arrives.
    #[serde(default)]
    pub validate_failure_requests: bool,
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Line format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_host() -> String {
    String::from("0.0.0.0")
}

const fn default_port() -> u16 {
    5000
}

fn default_service_name() -> String {
    String::from("DFS-Dashboard-Backend")
}

fn default_allowed_origins() -> Vec<String> {
    vec![String::from("*")]
}

const fn default_viewer_queue_capacity() -> usize {
    256
}

fn default_log_level() -> String {
    String::from("info")
}
