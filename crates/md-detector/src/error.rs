//! Error types for master detection

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectorError {
    /// Malformed construction input. Only fatal to that construction attempt.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A detection failed. Carries the failure message verbatim so every
    /// waiter failed by the same event observes the same message.
    #[error("{0}")]
    Failed(String),

    /// The detector was torn down before the detection resolved.
    #[error("Detection discarded")]
    Discarded,
}

impl DetectorError {
    pub fn is_discarded(&self) -> bool {
        matches!(self, DetectorError::Discarded)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, DetectorError::Failed(_))
    }
}

pub type Result<T> = std::result::Result<T, DetectorError>;

/// Failures reported by a [`Group`](crate::Group) or
/// [`LeaderElector`](crate::LeaderElector).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GroupError {
    #[error("Coordination service session expired")]
    SessionExpired,

    #[error("Membership {0} not found")]
    MembershipNotFound(u64),

    #[error("Coordination service unavailable: {0}")]
    Unavailable(String),
}
