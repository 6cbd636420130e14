//! Outstanding long-poll requests and their caller-side futures
//!
//! Each `detect()` call produces a single-assignment slot. The caller holds a
//! [`Detection`]; the owning detector keeps the sending half in a
//! [`WaiterRegistry`] until a state-changing event resolves it.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use md_common::Pid;
use tokio::sync::oneshot;

use crate::error::{DetectorError, Result};

/// Sending half of a detection, owned by the detector until resolved.
pub(crate) type Reply = oneshot::Sender<Result<Option<Pid>>>;

/// Future returned by [`MasterDetector::detect`](crate::MasterDetector::detect).
///
/// Resolves to the detected leader (`None` when there is no leader), to
/// [`DetectorError::Failed`] when detection failed, or to
/// [`DetectorError::Discarded`] when the detector went away first.
#[must_use = "a detection does nothing unless awaited"]
#[derive(Debug)]
pub struct Detection {
    rx: oneshot::Receiver<Result<Option<Pid>>>,
}

impl Detection {
    pub(crate) fn channel() -> (Reply, Detection) {
        let (tx, rx) = oneshot::channel();
        (tx, Detection { rx })
    }
}

impl Future for Detection {
    type Output = Result<Option<Pid>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(DetectorError::Discarded)))
    }
}

/// Parked detections, keyed by waiter id.
///
/// Every operation that resolves waiters drains the whole map, so a waiter is
/// resolved at most once and never left behind after a broadcast.
#[derive(Debug, Default)]
pub(crate) struct WaiterRegistry {
    waiters: HashMap<u64, Reply>,
    next_id: u64,
}

impl WaiterRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a reply slot and return its waiter id.
    pub(crate) fn park(&mut self, reply: Reply) -> u64 {
        // Callers that dropped their Detection can never be resolved.
        self.waiters.retain(|_, reply| !reply.is_closed());

        let id = self.next_id;
        self.next_id += 1;
        self.waiters.insert(id, reply);
        id
    }

    pub(crate) fn len(&self) -> usize {
        self.waiters.len()
    }

    /// Resolve every parked waiter with `leader`. Returns how many were resolved.
    pub(crate) fn fulfill(&mut self, leader: &Option<Pid>) -> usize {
        let count = self.waiters.len();
        for (_, reply) in self.waiters.drain() {
            let _ = reply.send(Ok(leader.clone()));
        }
        count
    }

    /// Fail every parked waiter with `message`.
    pub(crate) fn fail(&mut self, message: &str) -> usize {
        let count = self.waiters.len();
        for (_, reply) in self.waiters.drain() {
            let _ = reply.send(Err(DetectorError::Failed(message.to_string())));
        }
        count
    }

    /// Release every parked waiter without a value; callers observe
    /// [`DetectorError::Discarded`].
    pub(crate) fn discard(&mut self) -> usize {
        let count = self.waiters.len();
        self.waiters.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    fn pid(s: &str) -> Pid {
        Pid::parse(s).unwrap()
    }

    #[test]
    fn test_fulfill_resolves_all_with_same_value() {
        let mut registry = WaiterRegistry::new();
        let (tx1, d1) = Detection::channel();
        let (tx2, d2) = Detection::channel();
        registry.park(tx1);
        registry.park(tx2);

        let mut d1 = task::spawn(d1);
        let mut d2 = task::spawn(d2);
        assert_pending!(d1.poll());
        assert_pending!(d2.poll());

        let leader = Some(pid("master@10.0.0.1:5050"));
        assert_eq!(registry.fulfill(&leader), 2);
        assert_eq!(registry.len(), 0);

        assert!(d1.is_woken());
        assert_eq!(assert_ready!(d1.poll()), Ok(leader.clone()));
        assert_eq!(assert_ready!(d2.poll()), Ok(leader));
    }

    #[test]
    fn test_fail_carries_message() {
        let mut registry = WaiterRegistry::new();
        let (tx, detection) = Detection::channel();
        registry.park(tx);

        assert_eq!(registry.fail("session expired"), 1);

        let mut detection = task::spawn(detection);
        assert_eq!(
            assert_ready!(detection.poll()),
            Err(DetectorError::Failed("session expired".to_string()))
        );
    }

    #[test]
    fn test_discard_is_distinct_from_failure() {
        let mut registry = WaiterRegistry::new();
        let (tx, detection) = Detection::channel();
        registry.park(tx);

        assert_eq!(registry.discard(), 1);
        assert_eq!(registry.len(), 0);

        let mut detection = task::spawn(detection);
        let result = assert_ready!(detection.poll());
        assert!(result.unwrap_err().is_discarded());
    }

    #[test]
    fn test_park_prunes_abandoned_waiters() {
        let mut registry = WaiterRegistry::new();
        let (tx1, d1) = Detection::channel();
        registry.park(tx1);
        drop(d1);

        let (tx2, _d2) = Detection::channel();
        let id = registry.park(tx2);

        assert_eq!(id, 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_empty_registry_broadcasts_nothing() {
        let mut registry = WaiterRegistry::new();
        assert_eq!(registry.fulfill(&None), 0);
        assert_eq!(registry.fail("boom"), 0);
        assert_eq!(registry.discard(), 0);
    }
}
