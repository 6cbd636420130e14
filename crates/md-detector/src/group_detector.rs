//! Group-backed detection
//!
//! Leadership is derived from an external group's election. One actor task
//! per detector owns the leader state and parked detections. Two kinds of
//! asynchronous work post results back into it:
//!
//! - the watch: one outstanding [`LeaderElector::detect`] call at a time,
//!   re-armed after every change until it fails
//! - fetches: reading the new leader's advertised address, started on each
//!   leadership change and running concurrently with the re-armed watch
//!
//! A watch failure is terminal. A fetch failure only fails the detections
//! pending at that moment.

use std::sync::Arc;

use md_common::Pid;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::error::{DetectorError, GroupError};
use crate::group::{Group, GroupLeaderElector, LeaderElector, Membership};
use crate::state::LeaderState;
use crate::waiters::{Detection, Reply, WaiterRegistry};
use crate::MasterDetector;

enum Command {
    Detect { previous: Option<Pid>, reply: Reply },
}

enum Event {
    /// The elected membership changed, or the watch failed.
    Detected(Result<Option<Membership>, GroupError>),
    /// Data of `membership` was read, or reading it failed.
    Fetched {
        membership: Membership,
        result: Result<Vec<u8>, GroupError>,
    },
}

/// Detector that follows the leader elected in a [`Group`].
///
/// Must be created inside a tokio runtime. The group is owned by this
/// detector; dropping the detector (or calling [`shutdown`](Self::shutdown))
/// stops the watch and discards pending detections.
pub struct GroupMasterDetector {
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl GroupMasterDetector {
    /// Detect the oldest member of `group` as leader. Must be called inside a
    /// tokio runtime.
    pub fn new(group: Arc<dyn Group>) -> Self {
        let elector = Arc::new(GroupLeaderElector::new(group.clone()));
        Self::with_elector(group, elector)
    }

    /// Detect the leader reported by `elector`, reading its address from `group`.
    pub fn with_elector(group: Arc<dyn Group>, elector: Arc<dyn LeaderElector>) -> Self {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (events, events_rx) = mpsc::unbounded_channel();

        let process = GroupWatchLoop {
            group,
            elector,
            state: LeaderState::new(None),
            waiters: WaiterRegistry::new(),
            elected: None,
            events,
            watch: None,
            fetches: JoinSet::new(),
        };
        let task = tokio::spawn(process.run(commands_rx, events_rx));

        Self { commands, task }
    }

    /// Stop the detector and wait until pending detections are discarded.
    pub async fn shutdown(self) {
        let Self { commands, task } = self;
        drop(commands);
        let _ = task.await;
    }
}

impl MasterDetector for GroupMasterDetector {
    fn detect(&self, previous: Option<Pid>) -> Detection {
        let (reply, detection) = Detection::channel();
        let _ = self.commands.send(Command::Detect { previous, reply });
        detection
    }
}

struct GroupWatchLoop {
    group: Arc<dyn Group>,
    elector: Arc<dyn LeaderElector>,
    state: LeaderState,
    waiters: WaiterRegistry,
    /// Membership reported by the latest elector result.
    elected: Option<Membership>,
    events: mpsc::UnboundedSender<Event>,
    /// The single outstanding elector call, if any.
    watch: Option<JoinHandle<()>>,
    fetches: JoinSet<()>,
}

impl GroupWatchLoop {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<Event>,
    ) {
        self.arm(None);

        loop {
            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(Command::Detect { previous, reply }) => self.detect(previous, reply),
                    None => break,
                },
                Some(event) = events.recv() => match event {
                    Event::Detected(result) => self.detected(result),
                    Event::Fetched { membership, result } => self.fetched(membership, result),
                },
                // Reap finished fetches so the set does not grow.
                Some(_) = self.fetches.join_next(), if !self.fetches.is_empty() => {}
            }
        }

        self.terminate();
    }

    fn detect(&mut self, previous: Option<Pid>, reply: Reply) {
        // No longer operational after a watch failure.
        if let Some(message) = self.state.error() {
            let _ = reply.send(Err(DetectorError::Failed(message.to_string())));
            return;
        }

        if self.state.differs_from(&previous) {
            let _ = reply.send(Ok(self.state.leader().cloned()));
            return;
        }

        self.waiters.park(reply);
        debug!(pending = self.waiters.len(), "Waiting for a leadership change");
    }

    /// Ask the elector for the next leader, relative to `previous`.
    fn arm(&mut self, previous: Option<Membership>) {
        let elector = self.elector.clone();
        let events = self.events.clone();

        self.watch = Some(tokio::spawn(async move {
            let result = elector.detect(previous).await;
            let _ = events.send(Event::Detected(result));
        }));
    }

    fn fetch(&mut self, membership: Membership) {
        let group = self.group.clone();
        let events = self.events.clone();

        self.fetches.spawn(async move {
            let result = group.data(&membership).await;
            let _ = events.send(Event::Fetched { membership, result });
        });
    }

    fn detected(&mut self, result: Result<Option<Membership>, GroupError>) {
        self.watch = None;

        let leader = match result {
            Ok(leader) => leader,
            Err(e) => {
                error!(error = %e, "Failed to detect the leader");

                // Stops the detection loop for good; detect() fails from now on.
                let message = e.to_string();
                self.state.fail(message.clone());
                self.waiters.fail(&message);
                self.fetches.abort_all();
                return;
            }
        };

        self.elected = leader;

        match leader {
            None => {
                info!("No leading master detected");
                self.state.set_leader(None);
                self.waiters.fulfill(&None);
            }
            Some(membership) => {
                debug!(membership = %membership, "Leadership changed, fetching leader data");
                self.fetch(membership);
            }
        }

        // Keep watching while the fetch is in flight so that a quick
        // succession of leaders is not missed.
        self.arm(leader);
    }

    fn fetched(&mut self, membership: Membership, result: Result<Vec<u8>, GroupError>) {
        if self.state.error().is_some() {
            return;
        }

        // Leadership moved on while this fetch was in flight.
        if self.elected != Some(membership) {
            debug!(membership = %membership, "Dropping data fetched for a deposed leader");
            return;
        }

        let leader = match result.map_err(|e| e.to_string()).and_then(|data| decode(&data)) {
            Ok(leader) => leader,
            Err(message) => {
                warn!(error = %message, "Failed to fetch the leading master's data");
                self.state.set_leader(None);
                self.waiters.fail(&message);
                return;
            }
        };

        info!(leader = %leader, "A new leading master is detected");
        let leader = Some(leader);
        self.state.set_leader(leader.clone());
        self.waiters.fulfill(&leader);
    }

    fn terminate(&mut self) {
        if let Some(watch) = self.watch.take() {
            watch.abort();
        }
        self.fetches.abort_all();

        let discarded = self.waiters.discard();
        debug!(discarded, "Group master detector terminated");
    }
}

/// Leader data is the leader's textual process address.
fn decode(data: &[u8]) -> Result<Pid, String> {
    let text = std::str::from_utf8(data)
        .map_err(|e| format!("Leader data is not valid UTF-8: {}", e))?;

    Pid::parse(text).map_err(|e| format!("Failed to parse leader data: {}", e))
}
