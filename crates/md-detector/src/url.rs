//! Coordination service URLs
//!
//! `zk://[user:password@]host:port[,host:port...][/path]`

use std::fmt;

use crate::error::{DetectorError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authentication {
    pub scheme: String,
    pub credentials: String,
}

impl Authentication {
    pub fn digest(credentials: impl Into<String>) -> Self {
        Self {
            scheme: "digest".to_string(),
            credentials: credentials.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZooKeeperUrl {
    servers: String,
    path: String,
    authentication: Option<Authentication>,
}

impl ZooKeeperUrl {
    pub const SCHEME: &'static str = "zk://";

    pub fn parse(url: &str) -> Result<Self> {
        let rest = url.strip_prefix(Self::SCHEME).ok_or_else(|| {
            DetectorError::Config(format!(
                "Expecting '{}' at the beginning of the URL",
                Self::SCHEME
            ))
        })?;

        let (authority, path) = match rest.find('/') {
            Some(index) => (&rest[..index], &rest[index..]),
            None => (rest, "/"),
        };

        let (authentication, servers) = match authority.rsplit_once('@') {
            Some((credentials, servers)) => {
                if credentials.is_empty() {
                    return Err(DetectorError::Config("Empty credentials in the URL".to_string()));
                }
                (Some(Authentication::digest(credentials)), servers)
            }
            None => (None, authority),
        };

        if servers.is_empty() {
            return Err(DetectorError::Config(
                "Expecting at least one server in the URL".to_string(),
            ));
        }
        if servers.split(',').any(|server| server.trim().is_empty()) {
            return Err(DetectorError::Config(format!("Empty server entry in '{}'", servers)));
        }

        Ok(Self {
            servers: servers.to_string(),
            path: path.to_string(),
            authentication,
        })
    }

    /// Comma separated `host:port` list.
    pub fn servers(&self) -> &str {
        &self.servers
    }

    pub fn server_list(&self) -> impl Iterator<Item = &str> {
        self.servers.split(',').map(str::trim)
    }

    /// Chroot path; `/` when the URL carried none.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn authentication(&self) -> Option<&Authentication> {
        self.authentication.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.path == "/"
    }
}

impl fmt::Display for ZooKeeperUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Self::SCHEME)?;
        if let Some(auth) = &self.authentication {
            // Never print the password.
            let user = auth.credentials.split(':').next().unwrap_or_default();
            write!(f, "{}:****@", user)?;
        }
        write!(f, "{}{}", self.servers, self.path)
    }
}
