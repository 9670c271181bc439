//! # redlink-protocol
//!
//! RESP2 wire protocol implementation for redlink.
//!
//! This crate provides:
//! - Multi-bulk command encoding (binary-safe, append-only for pipelining)
//! - Incremental reply decoding over a growable byte buffer
//! - Reply kind discrimination for the typed-conversion layer
//! - Protocol error types

pub mod command;
pub mod error;
pub mod reply;

pub use command::{encode_command, CommandArgs};
pub use error::ProtocolError;
pub use reply::{Decoder, Reply, ReplyKind};

/// Default port the store server listens on.
pub const DEFAULT_PORT: u16 = 6379;

/// Maximum accepted bulk string length (512 MiB, the server-side limit).
pub const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Maximum accepted element count for a single array reply.
pub const MAX_ARRAY_LEN: usize = 1024 * 1024;

/// Maximum reply nesting depth.
pub const MAX_DEPTH: usize = 64;
