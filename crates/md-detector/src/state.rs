//! Current leadership view of one detector

use md_common::Pid;

/// The leader as last observed, or the error that ended detection.
///
/// `Errored` is absorbing: nothing moves a state out of it, so a detector that
/// stopped trusting its view of leadership never reports a leader again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LeaderState {
    Active(Option<Pid>),
    Errored(String),
}

impl LeaderState {
    pub(crate) fn new(leader: Option<Pid>) -> Self {
        LeaderState::Active(leader)
    }

    /// The known leader. Always `None` once errored.
    pub(crate) fn leader(&self) -> Option<&Pid> {
        match self {
            LeaderState::Active(leader) => leader.as_ref(),
            LeaderState::Errored(_) => None,
        }
    }

    pub(crate) fn error(&self) -> Option<&str> {
        match self {
            LeaderState::Active(_) => None,
            LeaderState::Errored(message) => Some(message),
        }
    }

    /// Record a new leader. Returns `false`, leaving the state untouched, if
    /// detection already failed terminally.
    pub(crate) fn set_leader(&mut self, leader: Option<Pid>) -> bool {
        match self {
            LeaderState::Active(current) => {
                *current = leader;
                true
            }
            LeaderState::Errored(_) => false,
        }
    }

    /// Move to the terminal state. The first error wins.
    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        if let LeaderState::Active(_) = self {
            *self = LeaderState::Errored(message.into());
        }
    }

    /// Whether a caller that last saw `previous` should be answered right away.
    pub(crate) fn differs_from(&self, previous: &Option<Pid>) -> bool {
        self.leader() != previous.as_ref()
    }
}
