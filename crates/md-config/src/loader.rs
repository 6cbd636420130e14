//! Configuration loader with file and environment variable support

use crate::{ConfigError, DetectorConfig};
use std::env;
use std::path::PathBuf;
use tracing::info;

/// Standard config file search paths
const CONFIG_PATHS: &[&str] = &[
    "detector.toml",
    "./config/detector.toml",
    "/etc/master-detector/detector.toml",
];

pub const CONFIG_ENV: &str = "MASTER_DETECTOR_CONFIG";
pub const MASTER_ENV: &str = "MASTER_DETECTOR_MASTER";
pub const SESSION_TIMEOUT_ENV: &str = "MASTER_DETECTOR_ZK_SESSION_TIMEOUT_SECS";

/// Configuration loader
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Create a loader with a specific config file path
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Load configuration from file (if found) with environment variable overrides
    pub fn load(&self) -> Result<DetectorConfig, ConfigError> {
        let mut config = DetectorConfig::default();

        if let Some(path) = self.find_config_file() {
            info!(?path, "Loading configuration from file");
            config = DetectorConfig::from_file(&path)?;
        }

        self.apply_env_overrides(&mut config);
        config.validate()?;

        Ok(config)
    }

    /// Find the configuration file to use
    fn find_config_file(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config_path {
            if path.exists() {
                return Some(path.clone());
            }
        }

        if let Ok(path) = env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        for path in CONFIG_PATHS {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        None
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&self, config: &mut DetectorConfig) {
        if let Ok(val) = env::var(MASTER_ENV) {
            config.master = val;
        }
        if let Ok(val) = env::var(SESSION_TIMEOUT_ENV) {
            if let Ok(secs) = val.parse() {
                config.zookeeper.session_timeout_secs = secs;
            }
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
