//! Command encoding in the multi-bulk request format.
//!
//! A command is an ordered array of binary-safe arguments. On the wire it is
//! `*<argc>\r\n` followed by `$<len>\r\n<bytes>\r\n` per argument. The
//! encoder never interprets argument semantics.

use crate::error::ProtocolError;
use bytes::{BufMut, BytesMut};

/// Argument vector for one command, borrowing caller-owned bytes.
///
/// The builder never copies argument data; every appended slice must outlive
/// the send call it is passed to, which the lifetime parameter enforces.
#[derive(Debug, Default)]
pub struct CommandArgs<'a> {
    argv: Vec<&'a [u8]>,
}

impl<'a> CommandArgs<'a> {
    pub fn new() -> Self {
        Self { argv: Vec::new() }
    }

    /// Appends one argument. Returns `&mut Self` so appends chain.
    pub fn arg<S>(&mut self, arg: &'a S) -> &mut Self
    where
        S: AsRef<[u8]> + ?Sized,
    {
        self.argv.push(arg.as_ref());
        self
    }

    pub fn len(&self) -> usize {
        self.argv.len()
    }

    pub fn is_empty(&self) -> bool {
        self.argv.is_empty()
    }

    /// Argument slices in append order.
    pub fn as_slices(&self) -> &[&'a [u8]] {
        &self.argv
    }
}

/// Encodes one command into `buf`.
///
/// Append-only: encoding several commands into the same buffer pipelines
/// them. An empty argument vector is rejected before anything is written.
pub fn encode_command(argv: &[&[u8]], buf: &mut BytesMut) -> Result<(), ProtocolError> {
    if argv.is_empty() {
        return Err(ProtocolError::EmptyCommand);
    }

    let mut itoa_buf = itoa::Buffer::new();

    buf.put_u8(b'*');
    buf.put_slice(itoa_buf.format(argv.len()).as_bytes());
    buf.put_slice(b"\r\n");

    for arg in argv {
        buf.put_u8(b'$');
        buf.put_slice(itoa_buf.format(arg.len()).as_bytes());
        buf.put_slice(b"\r\n");
        buf.put_slice(arg);
        buf.put_slice(b"\r\n");
    }

    Ok(())
}
