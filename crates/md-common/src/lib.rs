//! Shared types for master detection.
//!
//! The only type every detector, config and caller agree on is [`Pid`], the
//! address of a running process. A detected leader is reported as a `Pid`.

mod pid;

pub use pid::{Pid, PidError};
