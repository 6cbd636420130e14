//! Master Detector Configuration
//!
//! TOML-based configuration with environment variable override support.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Root detector configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Selects the detector: empty, `zk://...`, `file://...` or a process address
    pub master: String,

    pub zookeeper: ZooKeeperConfig,
}

/// Coordination service session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZooKeeperConfig {
    pub session_timeout_secs: u64,
}

impl Default for ZooKeeperConfig {
    fn default() -> Self {
        Self {
            session_timeout_secs: 10,
        }
    }
}

impl ZooKeeperConfig {
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }
}

impl DetectorConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: DetectorConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with environment variable override
    pub fn load() -> Result<Self, ConfigError> {
        let loader = ConfigLoader::new();
        loader.load()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.zookeeper.session_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "zookeeper.session_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Generate an example TOML configuration
    pub fn example_toml() -> String {
        r#"# Master Detector Configuration
# Environment variables override these settings

# One of:
#   ""                                  no leader until appointed
#   "master@10.0.0.1:5050"              fixed leader
#   "zk://host1:2181,host2:2181/mesos"  group-backed detection
#   "file:///etc/mesos/master"          read the target from a file
master = ""

[zookeeper]
session_timeout_secs = 10
"#
        .to_string()
    }
}
