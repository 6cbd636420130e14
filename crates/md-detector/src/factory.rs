//! Detector construction from a selector string
//!
//! - `""`: standalone, no leader
//! - `zk://servers/path`: group-backed, path must not be `/`
//! - `file:///some/path`: the file's trimmed contents, parsed again
//! - anything else: a process address (`master@` is prepended if missing),
//!   appointed on a standalone detector

use std::sync::Arc;
use std::time::Duration;

use md_common::Pid;
use md_config::DetectorConfig;
use tracing::info;

use crate::error::{DetectorError, Result};
use crate::group::GroupConnector;
use crate::group_detector::GroupMasterDetector;
use crate::standalone::StandaloneMasterDetector;
use crate::url::ZooKeeperUrl;
use crate::waiters::Detection;
use crate::MasterDetector;

pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(10);

const FILE_SCHEME: &str = "file://";
const MASTER_PREFIX: &str = "master@";

/// `file://` targets may point at files holding further `file://` targets.
const MAX_FILE_NESTING: usize = 8;

/// A detector of either kind.
pub enum Detector {
    Standalone(StandaloneMasterDetector),
    Group(GroupMasterDetector),
}

impl Detector {
    /// Create a detector with the default factory (no coordination service
    /// connector; `zk://` targets are rejected).
    pub fn create(master: &str) -> Result<Self> {
        DetectorFactory::new().create(master)
    }

    pub fn as_standalone(&self) -> Option<&StandaloneMasterDetector> {
        match self {
            Detector::Standalone(detector) => Some(detector),
            Detector::Group(_) => None,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Detector::Group(_))
    }

    pub async fn shutdown(self) {
        match self {
            Detector::Standalone(detector) => detector.shutdown().await,
            Detector::Group(detector) => detector.shutdown().await,
        }
    }
}

impl MasterDetector for Detector {
    fn detect(&self, previous: Option<Pid>) -> Detection {
        match self {
            Detector::Standalone(detector) => detector.detect(previous),
            Detector::Group(detector) => detector.detect(previous),
        }
    }
}

/// Builds detectors from selector strings.
pub struct DetectorFactory {
    session_timeout: Duration,
    connector: Option<Arc<dyn GroupConnector>>,
}

impl DetectorFactory {
    pub fn new() -> Self {
        Self {
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            connector: None,
        }
    }

    pub fn from_config(config: &DetectorConfig) -> Self {
        Self::new().with_session_timeout(config.zookeeper.session_timeout())
    }

    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Connector used to open the group behind `zk://` targets.
    pub fn with_connector(mut self, connector: Arc<dyn GroupConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn session_timeout(&self) -> Duration {
        self.session_timeout
    }

    /// Create a detector for `master`. Must be called inside a tokio runtime.
    pub fn create(&self, master: &str) -> Result<Detector> {
        // Every detector spawns its actor task.
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(DetectorError::Config(
                "Detectors must be created inside a tokio runtime".to_string(),
            ));
        }

        self.create_nested(master, 0)
    }

    fn create_nested(&self, master: &str, depth: usize) -> Result<Detector> {
        if master.is_empty() {
            return Ok(Detector::Standalone(StandaloneMasterDetector::new()));
        }

        if master.starts_with(ZooKeeperUrl::SCHEME) {
            return self.create_group(master);
        }

        if let Some(path) = master.strip_prefix(FILE_SCHEME) {
            if depth >= MAX_FILE_NESTING {
                return Err(DetectorError::Config(format!(
                    "Too many nested '{}' references at '{}'",
                    FILE_SCHEME, path
                )));
            }

            let contents = std::fs::read_to_string(path).map_err(|e| {
                DetectorError::Config(format!("Failed to read from file at '{}': {}", path, e))
            })?;

            return self.create_nested(contents.trim(), depth + 1);
        }

        let address = if master.starts_with(MASTER_PREFIX) {
            master.to_string()
        } else {
            format!("{}{}", MASTER_PREFIX, master)
        };

        let leader = Pid::parse(&address)
            .map_err(|e| DetectorError::Config(format!("Failed to parse '{}': {}", master, e)))?;

        info!(leader = %leader, "Using standalone master detector");
        Ok(Detector::Standalone(StandaloneMasterDetector::with_leader(leader)))
    }

    fn create_group(&self, master: &str) -> Result<Detector> {
        let url = ZooKeeperUrl::parse(master)?;

        if url.is_root() {
            return Err(DetectorError::Config(
                "Expecting a (chroot) path for ZooKeeper ('/' is not supported)".to_string(),
            ));
        }

        let connector = self.connector.as_ref().ok_or_else(|| {
            DetectorError::Config(format!(
                "No coordination service connector configured for '{}'",
                url
            ))
        })?;

        let group = connector
            .connect(&url, self.session_timeout)
            .map_err(|e| DetectorError::Config(format!("Failed to connect to '{}': {}", url, e)))?;

        info!(url = %url, session_timeout = ?self.session_timeout, "Using group master detector");
        Ok(Detector::Group(GroupMasterDetector::new(group)))
    }
}

impl Default for DetectorFactory {
    fn default() -> Self {
        Self::new()
    }
}
