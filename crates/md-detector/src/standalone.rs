//! Standalone detection
//!
//! Leadership is appointed from outside, e.g. by tests or when a single
//! master is configured explicitly. There is no failure mode.

use md_common::Pid;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::waiters::{Detection, Reply, WaiterRegistry};
use crate::MasterDetector;

enum Command {
    Appoint(Option<Pid>),
    Detect { previous: Option<Pid>, reply: Reply },
}

/// Detector whose leader is set through [`appoint`](Self::appoint).
///
/// Must be created inside a tokio runtime. Dropping the detector (or calling
/// [`shutdown`](Self::shutdown)) resolves pending detections as discarded.
pub struct StandaloneMasterDetector {
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl StandaloneMasterDetector {
    /// A detector with no leader until one is appointed. Must be called inside
    /// a tokio runtime.
    pub fn new() -> Self {
        Self::spawn(None)
    }

    /// A detector with `leader` already appointed.
    pub fn with_leader(leader: Pid) -> Self {
        Self::spawn(Some(leader))
    }

    fn spawn(leader: Option<Pid>) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let process = StandaloneProcess {
            leader,
            waiters: WaiterRegistry::new(),
        };
        let task = tokio::spawn(process.run(rx));

        Self { commands, task }
    }

    /// Set the leader and notify every pending detection, even when `leader`
    /// equals the current one.
    pub fn appoint(&self, leader: Option<Pid>) {
        let _ = self.commands.send(Command::Appoint(leader));
    }

    /// Stop the detector and wait until pending detections are discarded.
    pub async fn shutdown(self) {
        let Self { commands, task } = self;
        drop(commands);
        let _ = task.await;
    }
}

impl Default for StandaloneMasterDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl MasterDetector for StandaloneMasterDetector {
    fn detect(&self, previous: Option<Pid>) -> Detection {
        let (reply, detection) = Detection::channel();
        // If the process is gone the reply is dropped and the caller sees Discarded.
        let _ = self.commands.send(Command::Detect { previous, reply });
        detection
    }
}

struct StandaloneProcess {
    leader: Option<Pid>,
    waiters: WaiterRegistry,
}

impl StandaloneProcess {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = commands.recv().await {
            match command {
                Command::Appoint(leader) => self.appoint(leader),
                Command::Detect { previous, reply } => self.detect(previous, reply),
            }
        }

        let discarded = self.waiters.discard();
        debug!(discarded, "Standalone master detector terminated");
    }

    fn appoint(&mut self, leader: Option<Pid>) {
        match &leader {
            Some(pid) => info!(leader = %pid, "Master appointed"),
            None => info!("Master appointment cleared"),
        }

        self.leader = leader;
        self.waiters.fulfill(&self.leader);
    }

    fn detect(&mut self, previous: Option<Pid>, reply: Reply) {
        if self.leader != previous {
            let _ = reply.send(Ok(self.leader.clone()));
            return;
        }

        self.waiters.park(reply);
        debug!(pending = self.waiters.len(), "Waiting for an appointment");
    }
}
