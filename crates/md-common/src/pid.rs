//! Process addresses of the form `id@host:port`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PidError {
    #[error("Missing '@' in process address '{0}'")]
    MissingSeparator(String),

    #[error("Empty process id in '{0}'")]
    EmptyId(String),

    #[error("Empty host in '{0}'")]
    EmptyHost(String),

    #[error("Missing port in '{0}'")]
    MissingPort(String),

    #[error("Invalid port in '{0}'")]
    InvalidPort(String),
}

/// Address of a process, e.g. `master@10.0.0.1:5050`.
///
/// Two addresses are equal when id, host and port all match; detectors rely on
/// this to decide whether the leader changed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pid {
    id: String,
    host: String,
    port: u16,
}

impl Pid {
    pub fn new(id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            port,
        }
    }

    /// Parse the textual `id@host:port` form.
    pub fn parse(s: &str) -> Result<Self, PidError> {
        let s = s.trim();

        let (id, address) = s
            .split_once('@')
            .ok_or_else(|| PidError::MissingSeparator(s.to_string()))?;

        if id.is_empty() {
            return Err(PidError::EmptyId(s.to_string()));
        }

        // rsplit so that bracketed IPv6 hosts keep their inner colons
        let (host, port) = address
            .rsplit_once(':')
            .ok_or_else(|| PidError::MissingPort(s.to_string()))?;

        if host.is_empty() {
            return Err(PidError::EmptyHost(s.to_string()));
        }
        if port.is_empty() {
            return Err(PidError::MissingPort(s.to_string()));
        }

        let port = port
            .parse::<u16>()
            .map_err(|_| PidError::InvalidPort(s.to_string()))?;

        Ok(Self::new(id, host, port))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.id, self.host, self.port)
    }
}

impl FromStr for Pid {
    type Err = PidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pid::parse(s)
    }
}

impl Serialize for Pid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Pid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Pid::parse(&s).map_err(serde::de::Error::custom)
    }
}
