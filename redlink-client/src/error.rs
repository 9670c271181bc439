//! Client error types.

use redlink_protocol::{ProtocolError, ReplyKind};
use std::io;
use thiserror::Error;

/// Errors surfaced by the connection core.
///
/// The connect-time variants stay distinct on purpose: [`Resolve`] means no
/// transport handle could be produced at all, while [`Connect`] means an
/// attempt was made against a concrete address and failed.
///
/// [`Resolve`]: ClientError::Resolve
/// [`Connect`]: ClientError::Connect
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("cannot resolve server address {addr}: {source}")]
    Resolve { addr: String, source: io::Error },

    #[error("failed to connect to {addr}: {source}")]
    Connect { addr: String, source: io::Error },

    #[error("failed to {op}: {source}")]
    Configure { op: &'static str, source: io::Error },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("socket timeout")]
    Timeout,

    #[error("connection closed by server")]
    ConnectionClosed,

    /// The server answered with a well-formed error reply. The connection
    /// itself stays usable.
    #[error("server error: {0}")]
    Server(String),

    /// A session setup command got a reply of the wrong kind.
    #[error("unexpected {kind:?} reply to {command}")]
    UnexpectedReply {
        command: &'static str,
        kind: ReplyKind,
    },
}

impl ClientError {
    /// Whether a fresh connection could plausibly succeed where this failed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Connect { .. }
                | ClientError::Io(_)
                | ClientError::Timeout
                | ClientError::ConnectionClosed
        )
    }
}
