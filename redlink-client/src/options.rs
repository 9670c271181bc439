//! Connection options.

use redlink_protocol::DEFAULT_PORT;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Server endpoint, selected by transport kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAddr {
    /// TCP endpoint.
    Tcp { host: String, port: u16 },
    /// Unix-domain socket path.
    Unix { path: PathBuf },
}

impl fmt::Display for ConnectionAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionAddr::Tcp { host, port } => write!(f, "{}:{}", host, port),
            ConnectionAddr::Unix { path } => write!(f, "{}", path.display()),
        }
    }
}

/// Options for constructing a [`Connection`](crate::Connection).
///
/// A timeout of `Duration::ZERO` means "no deadline": the operation blocks
/// until the OS gives up, never "fail immediately". Timeouts are applied at
/// microsecond resolution; sub-microsecond remainders are truncated.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Server endpoint.
    pub addr: ConnectionAddr,
    /// Deadline for establishing the transport. Zero blocks indefinitely.
    pub connect_timeout: Duration,
    /// Read/write deadline on the established connection. Zero blocks
    /// indefinitely.
    pub socket_timeout: Duration,
    /// Enable OS-level keep-alive probes.
    pub keep_alive: bool,
    /// Password sent via AUTH during session setup, if any.
    pub password: Option<String>,
    /// Logical database selected via SELECT during session setup.
    pub db: u32,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            addr: ConnectionAddr::Tcp {
                host: "127.0.0.1".to_string(),
                port: DEFAULT_PORT,
            },
            connect_timeout: Duration::ZERO,
            socket_timeout: Duration::ZERO,
            keep_alive: false,
            password: None,
            db: 0,
        }
    }
}

impl ConnectionOptions {
    /// TCP endpoint options with defaults for everything else.
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self {
            addr: ConnectionAddr::Tcp {
                host: host.into(),
                port,
            },
            ..Default::default()
        }
    }

    /// Unix-domain endpoint options with defaults for everything else.
    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Self {
            addr: ConnectionAddr::Unix { path: path.into() },
            ..Default::default()
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout = timeout;
        self
    }

    pub fn with_keep_alive(mut self, enable: bool) -> Self {
        self.keep_alive = enable;
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_db(mut self, db: u32) -> Self {
        self.db = db;
        self
    }
}
