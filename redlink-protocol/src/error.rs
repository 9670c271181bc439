//! Protocol error types.

use thiserror::Error;

/// Errors raised while encoding commands or decoding replies.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown reply type byte: {0:#04x}")]
    UnknownPrefix(u8),

    #[error("malformed integer line")]
    InvalidInteger,

    #[error("expected CRLF terminator")]
    MissingCrlf,

    #[error("invalid UTF-8 in status or error line")]
    InvalidUtf8,

    #[error("bulk string too large: {len} bytes (max {max})")]
    BulkTooLarge { len: usize, max: usize },

    #[error("array too large: {len} elements (max {max})")]
    ArrayTooLarge { len: usize, max: usize },

    #[error("reply nesting exceeds {max} levels")]
    DepthExceeded { max: usize },

    #[error("cannot encode a command with no arguments")]
    EmptyCommand,

    /// More bytes are needed before a full reply can be parsed.
    ///
    /// Internal to the parser; [`Decoder::decode`](crate::Decoder::decode)
    /// maps it to `Ok(None)` at the boundary.
    #[error("incomplete reply")]
    Incomplete,
}
