//! Coordination group collaborators
//!
//! A [`Group`] is an ordered set of members, each advertising some data. A
//! [`LeaderElector`] turns group membership into "who leads": the oldest
//! member (smallest sequence id) wins. Detectors only observe the election;
//! they never join the group themselves.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::GroupError;
use crate::url::ZooKeeperUrl;

/// Handle identifying one member of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Membership {
    id: u64,
}

impl Membership {
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    /// Sequence number assigned when the member joined.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Display for Membership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Membership of an external coordination group.
///
/// Watches are single-shot: each call resolves once and must be re-issued to
/// observe the next change.
#[async_trait]
pub trait Group: Send + Sync {
    /// Join the group advertising `data`.
    async fn join(&self, data: Vec<u8>) -> Result<Membership, GroupError>;

    /// Leave the group. Returns `false` if the membership was already gone.
    async fn cancel(&self, membership: &Membership) -> Result<bool, GroupError>;

    /// Fetch the data advertised by `membership`.
    async fn data(&self, membership: &Membership) -> Result<Vec<u8>, GroupError>;

    /// Resolve with the current memberships once they differ from `expected`.
    async fn watch(
        &self,
        expected: BTreeSet<Membership>,
    ) -> Result<BTreeSet<Membership>, GroupError>;
}

/// Reports the elected member of a group.
#[async_trait]
pub trait LeaderElector: Send + Sync {
    /// Resolve with the elected membership (`None` when the group is empty)
    /// once it differs from `previous`. Errors are unrecoverable.
    async fn detect(&self, previous: Option<Membership>) -> Result<Option<Membership>, GroupError>;
}

/// [`LeaderElector`] over any [`Group`]: the oldest member leads.
pub struct GroupLeaderElector {
    group: Arc<dyn Group>,
}

impl GroupLeaderElector {
    pub fn new(group: Arc<dyn Group>) -> Self {
        Self { group }
    }
}

#[async_trait]
impl LeaderElector for GroupLeaderElector {
    async fn detect(&self, previous: Option<Membership>) -> Result<Option<Membership>, GroupError> {
        // Seeding with `previous` makes the first watch return at once unless
        // the group consists of exactly the previous leader.
        let mut expected: BTreeSet<Membership> = previous.into_iter().collect();

        loop {
            let memberships = self.group.watch(expected).await?;
            let current = memberships.first().copied();

            if current != previous {
                return Ok(current);
            }

            // Membership changed but the incumbent still leads.
            expected = memberships;
        }
    }
}

/// Opens a [`Group`] for a coordination service URL.
pub trait GroupConnector: Send + Sync {
    fn connect(
        &self,
        url: &ZooKeeperUrl,
        session_timeout: Duration,
    ) -> Result<Arc<dyn Group>, GroupError>;
}
