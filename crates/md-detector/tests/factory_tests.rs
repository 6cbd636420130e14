//! DetectorFactory Tests
//!
//! Tests for:
//! - Selecting the detector kind from the selector string
//! - `file://` indirection
//! - Configuration errors raised before any connection attempt

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use md_config::DetectorConfig;
use md_detector::{
    Detector, DetectorError, DetectorFactory, Group, GroupConnector, GroupError,
    InMemoryGroupConnector, MasterDetector, Pid, ZooKeeperUrl,
};

/// Connector that records every connection attempt.
struct CountingConnector {
    inner: InMemoryGroupConnector,
    connects: AtomicUsize,
    last_timeout: parking_lot::Mutex<Option<Duration>>,
}

impl CountingConnector {
    fn new() -> Self {
        Self {
            inner: InMemoryGroupConnector::new(),
            connects: AtomicUsize::new(0),
            last_timeout: parking_lot::Mutex::new(None),
        }
    }

    fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl GroupConnector for CountingConnector {
    fn connect(
        &self,
        url: &ZooKeeperUrl,
        session_timeout: Duration,
    ) -> Result<Arc<dyn Group>, GroupError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        *self.last_timeout.lock() = Some(session_timeout);
        self.inner.connect(url, session_timeout)
    }
}

struct RefusingConnector;

impl GroupConnector for RefusingConnector {
    fn connect(
        &self,
        _url: &ZooKeeperUrl,
        _session_timeout: Duration,
    ) -> Result<Arc<dyn Group>, GroupError> {
        Err(GroupError::Unavailable("connection refused".to_string()))
    }
}

fn write_target(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn config_error(result: Result<Detector, DetectorError>) -> String {
    match result {
        Err(DetectorError::Config(message)) => message,
        Err(other) => panic!("expected configuration error, got {:?}", other),
        Ok(_) => panic!("expected configuration error, got a detector"),
    }
}

#[tokio::test]
async fn test_empty_target_has_no_leader() {
    let detector = Detector::create("").unwrap();
    let standalone = detector.as_standalone().expect("standalone detector");

    let leader = Pid::parse("master@10.0.0.1:5050").unwrap();
    let detection = detector.detect(None);
    standalone.appoint(Some(leader.clone()));

    assert_eq!(detection.await, Ok(Some(leader)));
}

#[tokio::test]
async fn test_address_target_is_preappointed() {
    let detector = Detector::create("master@10.0.0.1:5050").unwrap();
    assert!(detector.as_standalone().is_some());
    assert_eq!(
        detector.detect(None).await,
        Ok(Some(Pid::parse("master@10.0.0.1:5050").unwrap()))
    );
}

#[tokio::test]
async fn test_bare_address_gets_master_prefix() {
    let detector = Detector::create("10.0.0.1:5050").unwrap();
    assert_eq!(
        detector.detect(None).await,
        Ok(Some(Pid::parse("master@10.0.0.1:5050").unwrap()))
    );
}

#[tokio::test]
async fn test_unparseable_address_rejected() {
    let message = config_error(Detector::create("10.0.0.1"));
    assert!(message.contains("Failed to parse '10.0.0.1'"));

    config_error(Detector::create("master@host:notaport"));
}

#[tokio::test]
async fn test_root_path_rejected_before_connecting() {
    let connector = Arc::new(CountingConnector::new());
    let factory = DetectorFactory::new().with_connector(connector.clone());

    let message = config_error(factory.create("zk://localhost:2181/"));
    assert_eq!(
        message,
        "Expecting a (chroot) path for ZooKeeper ('/' is not supported)"
    );

    config_error(factory.create("zk://localhost:2181"));
    assert_eq!(connector.connects(), 0);
}

#[tokio::test]
async fn test_malformed_zk_url_rejected() {
    let connector = Arc::new(CountingConnector::new());
    let factory = DetectorFactory::new().with_connector(connector.clone());

    config_error(factory.create("zk:///mesos"));
    assert_eq!(connector.connects(), 0);
}

#[tokio::test]
async fn test_connection_failure_is_config_error() {
    let factory = DetectorFactory::new().with_connector(Arc::new(RefusingConnector));

    let message = config_error(factory.create("zk://localhost:2181/mesos"));
    assert!(message.contains("connection refused"));
}

#[tokio::test]
async fn test_zk_target_is_group_backed() {
    let connector = Arc::new(CountingConnector::new());
    let mut config = DetectorConfig::default();
    config.master = "zk://localhost:2181/mesos".to_string();
    config.zookeeper.session_timeout_secs = 15;

    let factory = DetectorFactory::from_config(&config).with_connector(connector.clone());
    let detector = factory.create(&config.master).unwrap();

    assert!(detector.is_group());
    assert_eq!(connector.connects(), 1);
    assert_eq!(*connector.last_timeout.lock(), Some(Duration::from_secs(15)));

    let url = ZooKeeperUrl::parse(&config.master).unwrap();
    let group = connector.inner.group(&url);

    let detection = detector.detect(None);
    group.join(b"master@10.0.0.1:5050".to_vec()).await.unwrap();

    let detected = tokio::time::timeout(Duration::from_secs(5), detection)
        .await
        .unwrap();
    assert_eq!(detected, Ok(Some(Pid::parse("master@10.0.0.1:5050").unwrap())));

    detector.shutdown().await;
}

#[tokio::test]
async fn test_file_target_is_reparsed() {
    let file = write_target("  master@10.0.0.1:5050\n");
    let target = format!("file://{}", file.path().display());

    let detector = Detector::create(&target).unwrap();
    assert_eq!(
        detector.detect(None).await,
        Ok(Some(Pid::parse("master@10.0.0.1:5050").unwrap()))
    );
}

#[tokio::test]
async fn test_file_target_can_hold_zk_url() {
    let connector = Arc::new(CountingConnector::new());
    let factory = DetectorFactory::new().with_connector(connector.clone());

    let file = write_target("zk://localhost:2181/mesos\n");
    let detector = factory
        .create(&format!("file://{}", file.path().display()))
        .unwrap();

    assert!(detector.is_group());
    assert_eq!(connector.connects(), 1);
}

#[tokio::test]
async fn test_empty_file_is_standalone_without_leader() {
    let file = write_target("\n");
    let detector = Detector::create(&format!("file://{}", file.path().display())).unwrap();
    assert!(detector.as_standalone().is_some());
}

#[tokio::test]
async fn test_missing_file_rejected() {
    let message = config_error(Detector::create("file:///nonexistent/master"));
    assert!(message.contains("Failed to read from file at '/nonexistent/master'"));
}

#[tokio::test]
async fn test_self_referencing_file_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    let target = format!("file://{}", file.path().display());
    file.write_all(target.as_bytes()).unwrap();
    file.flush().unwrap();

    let message = config_error(Detector::create(&target));
    assert!(message.contains("Too many nested"));
}
