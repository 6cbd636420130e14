//! Process-local group for single-node deployments and tests
//!
//! [`InMemoryGroup`] behaves like a coordination-service group: sequential
//! membership ids, single-shot watches, per-member data. Session expiry and
//! data-fetch failures can be injected.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

use crate::error::GroupError;
use crate::group::{Group, GroupConnector, Membership};
use crate::url::ZooKeeperUrl;

#[derive(Debug, Default)]
struct GroupState {
    members: BTreeMap<Membership, Vec<u8>>,
    next_id: u64,
    expired: bool,
    data_failure: Option<String>,
}

pub struct InMemoryGroup {
    state: watch::Sender<GroupState>,
}

impl InMemoryGroup {
    pub fn new() -> Self {
        let (state, _) = watch::channel(GroupState::default());
        Self { state }
    }

    /// Expire the session: every outstanding and future operation fails with
    /// [`GroupError::SessionExpired`].
    pub fn expire_session(&self) {
        self.state.send_modify(|state| state.expired = true);
    }

    /// Make data fetches fail with `message` until cleared with `None`.
    pub fn set_data_failure(&self, message: Option<String>) {
        self.state.send_modify(|state| state.data_failure = message);
    }

    /// Current memberships, oldest first.
    pub fn memberships(&self) -> BTreeSet<Membership> {
        self.state.borrow().members.keys().copied().collect()
    }
}

impl Default for InMemoryGroup {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Group for InMemoryGroup {
    async fn join(&self, data: Vec<u8>) -> Result<Membership, GroupError> {
        let mut joined = Err(GroupError::SessionExpired);

        self.state.send_if_modified(|state| {
            if state.expired {
                return false;
            }
            let membership = Membership::new(state.next_id);
            state.next_id += 1;
            state.members.insert(membership, data);
            joined = Ok(membership);
            true
        });

        if let Ok(membership) = &joined {
            debug!(membership = %membership, "Joined group");
        }
        joined
    }

    async fn cancel(&self, membership: &Membership) -> Result<bool, GroupError> {
        let mut cancelled = Err(GroupError::SessionExpired);

        self.state.send_if_modified(|state| {
            if state.expired {
                return false;
            }
            let removed = state.members.remove(membership).is_some();
            cancelled = Ok(removed);
            removed
        });

        cancelled
    }

    async fn data(&self, membership: &Membership) -> Result<Vec<u8>, GroupError> {
        let state = self.state.borrow();

        if state.expired {
            return Err(GroupError::SessionExpired);
        }
        if let Some(message) = &state.data_failure {
            return Err(GroupError::Unavailable(message.clone()));
        }

        state
            .members
            .get(membership)
            .cloned()
            .ok_or(GroupError::MembershipNotFound(membership.id()))
    }

    async fn watch(
        &self,
        expected: BTreeSet<Membership>,
    ) -> Result<BTreeSet<Membership>, GroupError> {
        let mut rx = self.state.subscribe();

        loop {
            {
                let state = rx.borrow_and_update();
                if state.expired {
                    return Err(GroupError::SessionExpired);
                }
                let current: BTreeSet<Membership> = state.members.keys().copied().collect();
                if current != expected {
                    return Ok(current);
                }
            }

            if rx.changed().await.is_err() {
                return Err(GroupError::Unavailable("group closed".to_string()));
            }
        }
    }
}

/// Hands out one shared [`InMemoryGroup`] per servers and path.
#[derive(Default)]
pub struct InMemoryGroupConnector {
    groups: Mutex<HashMap<String, Arc<InMemoryGroup>>>,
}

impl InMemoryGroupConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// The group a detector for `url` observes, created on first use.
    pub fn group(&self, url: &ZooKeeperUrl) -> Arc<InMemoryGroup> {
        let key = format!("{}{}", url.servers(), url.path());
        self.groups
            .lock()
            .entry(key)
            .or_insert_with(|| Arc::new(InMemoryGroup::new()))
            .clone()
    }
}

impl GroupConnector for InMemoryGroupConnector {
    fn connect(
        &self,
        url: &ZooKeeperUrl,
        _session_timeout: Duration,
    ) -> Result<Arc<dyn Group>, GroupError> {
        let group: Arc<dyn Group> = self.group(url);
        Ok(group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_join_assigns_sequential_ids() {
        let group = InMemoryGroup::new();
        let a = group.join(b"a".to_vec()).await.unwrap();
        let b = group.join(b"b".to_vec()).await.unwrap();

        assert!(a < b);
        assert_eq!(group.data(&b).await.unwrap(), b"b".to_vec());
        assert_eq!(group.memberships().len(), 2);
    }

    #[tokio::test]
    async fn test_cancel() {
        let group = InMemoryGroup::new();
        let a = group.join(b"a".to_vec()).await.unwrap();

        assert!(group.cancel(&a).await.unwrap());
        assert!(!group.cancel(&a).await.unwrap());
        assert_eq!(group.data(&a).await, Err(GroupError::MembershipNotFound(a.id())));
    }

    #[tokio::test]
    async fn test_watch_returns_immediately_on_difference() {
        let group = InMemoryGroup::new();
        let a = group.join(b"a".to_vec()).await.unwrap();

        let current = group.watch(BTreeSet::new()).await.unwrap();
        assert!(current.contains(&a));
    }

    #[tokio::test]
    async fn test_watch_waits_for_change() {
        let group = Arc::new(InMemoryGroup::new());

        let watcher = {
            let group = group.clone();
            tokio::spawn(async move { group.watch(BTreeSet::new()).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!watcher.is_finished());

        let a = group.join(b"a".to_vec()).await.unwrap();
        let current = watcher.await.unwrap().unwrap();
        assert_eq!(current, BTreeSet::from([a]));
    }

    #[tokio::test]
    async fn test_session_expiry_fails_everything() {
        let group = Arc::new(InMemoryGroup::new());
        let a = group.join(b"a".to_vec()).await.unwrap();

        let watcher = {
            let group = group.clone();
            tokio::spawn(async move { group.watch(BTreeSet::from([a])).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        group.expire_session();

        assert_eq!(watcher.await.unwrap(), Err(GroupError::SessionExpired));
        assert_eq!(group.join(b"b".to_vec()).await, Err(GroupError::SessionExpired));
        assert_eq!(group.data(&a).await, Err(GroupError::SessionExpired));
    }

    #[tokio::test]
    async fn test_data_failure_injection() {
        let group = InMemoryGroup::new();
        let a = group.join(b"a".to_vec()).await.unwrap();

        group.set_data_failure(Some("znode unreadable".to_string()));
        assert_eq!(
            group.data(&a).await,
            Err(GroupError::Unavailable("znode unreadable".to_string()))
        );

        group.set_data_failure(None);
        assert_eq!(group.data(&a).await.unwrap(), b"a".to_vec());
    }

    #[test]
    fn test_connector_shares_group_per_path() {
        let connector = InMemoryGroupConnector::new();
        let mesos = ZooKeeperUrl::parse("zk://localhost:2181/mesos").unwrap();
        let other = ZooKeeperUrl::parse("zk://localhost:2181/other").unwrap();

        assert!(Arc::ptr_eq(&connector.group(&mesos), &connector.group(&mesos)));
        assert!(!Arc::ptr_eq(&connector.group(&mesos), &connector.group(&other)));
    }
}
