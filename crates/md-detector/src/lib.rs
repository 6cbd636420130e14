//! Leading master detection
//!
//! A detector answers one question for any number of callers: who is the
//! current leading master? Callers long-poll with [`MasterDetector::detect`],
//! passing the leader they last saw; the returned [`Detection`] resolves as
//! soon as the leader differs from that.
//!
//! # Detectors
//!
//! - [`StandaloneMasterDetector`]: the leader is appointed explicitly
//! - [`GroupMasterDetector`]: the leader is the elected member of a
//!   coordination [`Group`]; its advertised data is the leader's address
//!
//! [`DetectorFactory`] picks one from a selector string (empty, `zk://...`,
//! `file://...` or a process address).
//!
//! # Example
//!
//! ```no_run
//! use md_detector::{Detector, MasterDetector};
//!
//! async fn follow_leader() {
//!     let detector = Detector::create("master@10.0.0.1:5050").unwrap();
//!
//!     let mut leader = None;
//!     loop {
//!         match detector.detect(leader.clone()).await {
//!             Ok(current) => {
//!                 println!("Leader is now {:?}", current);
//!                 leader = current;
//!             }
//!             Err(e) if e.is_discarded() => break,
//!             Err(e) => {
//!                 eprintln!("Detection failed: {}", e);
//!                 break;
//!             }
//!         }
//!     }
//! }
//! ```

mod error;
mod factory;
mod group;
mod group_detector;
mod memory;
mod standalone;
mod state;
mod url;
mod waiters;

pub use error::{DetectorError, GroupError, Result};
pub use factory::{Detector, DetectorFactory, DEFAULT_SESSION_TIMEOUT};
pub use group::{Group, GroupConnector, GroupLeaderElector, LeaderElector, Membership};
pub use group_detector::GroupMasterDetector;
pub use md_common::Pid;
pub use memory::{InMemoryGroup, InMemoryGroupConnector};
pub use standalone::StandaloneMasterDetector;
pub use url::{Authentication, ZooKeeperUrl};
pub use waiters::Detection;

/// Long-poll access to the current leader.
pub trait MasterDetector: Send + Sync {
    /// Resolve with the current leader if it differs from `previous`,
    /// otherwise wait for the next change.
    ///
    /// The request is registered when this is called, not when the returned
    /// future is first polled. There is no timeout.
    fn detect(&self, previous: Option<Pid>) -> Detection;
}
