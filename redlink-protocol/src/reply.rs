//! Reply parsing: the RESP2 reply kinds and the incremental decoder.

use crate::error::ProtocolError;
use crate::{MAX_ARRAY_LEN, MAX_BULK_LEN, MAX_DEPTH};
use bytes::{Buf, Bytes, BytesMut};

/// A single parsed reply.
///
/// Null bulk strings (`$-1`) and null arrays (`*-1`) both parse to
/// [`Reply::Nil`], matching the client-side protocol contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+OK` style status line.
    Status(String),
    /// `-ERR ...` error line, text as reported by the server.
    Error(String),
    /// `:n` signed 64-bit integer.
    Integer(i64),
    /// `$n` length-prefixed binary string.
    Bulk(Bytes),
    /// `$-1` or `*-1`.
    Nil,
    /// `*n` aggregate of nested replies.
    Array(Vec<Reply>),
}

/// Reply kind discriminant, for callers that match on shape only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Status,
    Error,
    Integer,
    Bulk,
    Nil,
    Array,
}

impl Reply {
    pub fn kind(&self) -> ReplyKind {
        match self {
            Reply::Status(_) => ReplyKind::Status,
            Reply::Error(_) => ReplyKind::Error,
            Reply::Integer(_) => ReplyKind::Integer,
            Reply::Bulk(_) => ReplyKind::Bulk,
            Reply::Nil => ReplyKind::Nil,
            Reply::Array(_) => ReplyKind::Array,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Reply::Nil)
    }

    /// Whether this is the `+OK` status the session setup commands require.
    pub fn is_ok_status(&self) -> bool {
        matches!(self, Reply::Status(status) if status == "OK")
    }

    pub fn as_status(&self) -> Option<&str> {
        match self {
            Reply::Status(status) => Some(status),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Reply::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bulk(&self) -> Option<&[u8]> {
        match self {
            Reply::Bulk(data) => Some(data),
            _ => None,
        }
    }

    /// Server error text, if this is an error reply.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Reply::Error(message) => Some(message),
            _ => None,
        }
    }
}

/// Incremental reply decoder.
///
/// Raw socket reads are appended with [`extend`](Decoder::extend); `decode`
/// consumes buffered bytes only once a complete reply is present and returns
/// `Ok(None)` until then. Bytes past the first complete reply stay buffered
/// for the next call, which is what makes pipelined receives work.
#[derive(Debug)]
pub struct Decoder {
    buffer: BytesMut,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Appends raw bytes read off the socket.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to decode the next reply from the buffer.
    ///
    /// Returns `Ok(Some(reply))` when a full reply was parsed and consumed,
    /// `Ok(None)` when more data is needed, or `Err` on malformed input.
    pub fn decode(&mut self) -> Result<Option<Reply>, ProtocolError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        let mut cursor = &self.buffer[..];
        match parse_reply(&mut cursor, 0) {
            Ok(reply) => {
                let consumed = self.buffer.len() - cursor.len();
                self.buffer.advance(consumed);
                Ok(Some(reply))
            }
            Err(ProtocolError::Incomplete) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Bytes currently buffered but not yet parsed.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Discards all buffered bytes.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_reply(cursor: &mut &[u8], depth: usize) -> Result<Reply, ProtocolError> {
    if depth > MAX_DEPTH {
        return Err(ProtocolError::DepthExceeded { max: MAX_DEPTH });
    }
    if cursor.is_empty() {
        return Err(ProtocolError::Incomplete);
    }

    let prefix = cursor[0];
    let line = read_line(cursor)?;
    let rest = line.get(1..).unwrap_or(&[]);

    match prefix {
        b'+' => Ok(Reply::Status(to_utf8(rest)?)),
        b'-' => Ok(Reply::Error(to_utf8(rest)?)),
        b':' => Ok(Reply::Integer(parse_i64(rest)?)),
        b'$' => parse_bulk(cursor, parse_i64(rest)?),
        b'*' => parse_array(cursor, parse_i64(rest)?, depth),
        other => Err(ProtocolError::UnknownPrefix(other)),
    }
}

fn parse_bulk(cursor: &mut &[u8], len: i64) -> Result<Reply, ProtocolError> {
    if len < 0 {
        return Ok(Reply::Nil);
    }

    let len = len as usize;
    if len > MAX_BULK_LEN {
        return Err(ProtocolError::BulkTooLarge {
            len,
            max: MAX_BULK_LEN,
        });
    }
    if cursor.len() < len + 2 {
        return Err(ProtocolError::Incomplete);
    }

    let (data, rest) = cursor.split_at(len);
    if &rest[..2] != b"\r\n" {
        return Err(ProtocolError::MissingCrlf);
    }

    let reply = Reply::Bulk(Bytes::copy_from_slice(data));
    *cursor = &rest[2..];
    Ok(reply)
}

fn parse_array(cursor: &mut &[u8], len: i64, depth: usize) -> Result<Reply, ProtocolError> {
    if len < 0 {
        return Ok(Reply::Nil);
    }

    let len = len as usize;
    if len > MAX_ARRAY_LEN {
        return Err(ProtocolError::ArrayTooLarge {
            len,
            max: MAX_ARRAY_LEN,
        });
    }

    // Capacity is capped so a hostile length prefix cannot force a huge
    // allocation before any element bytes have arrived.
    let mut items = Vec::with_capacity(len.min(1024));
    for _ in 0..len {
        items.push(parse_reply(cursor, depth + 1)?);
    }
    Ok(Reply::Array(items))
}

/// Returns the next CRLF-terminated line (terminator excluded) and advances
/// the cursor past it.
fn read_line<'b>(cursor: &mut &'b [u8]) -> Result<&'b [u8], ProtocolError> {
    let Some(pos) = cursor.windows(2).position(|window| window == b"\r\n") else {
        return Err(ProtocolError::Incomplete);
    };
    let line = &cursor[..pos];
    *cursor = &cursor[pos + 2..];
    Ok(line)
}

fn parse_i64(digits: &[u8]) -> Result<i64, ProtocolError> {
    std::str::from_utf8(digits)
        .ok()
        .and_then(|text| text.parse::<i64>().ok())
        .ok_or(ProtocolError::InvalidInteger)
}

fn to_utf8(line: &[u8]) -> Result<String, ProtocolError> {
    std::str::from_utf8(line)
        .map(str::to_owned)
        .map_err(|_| ProtocolError::InvalidUtf8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn decode_one(wire: &[u8]) -> Result<Option<Reply>, ProtocolError> {
        let mut decoder = Decoder::new();
        decoder.extend(wire);
        decoder.decode()
    }

    #[test]
    fn test_decode_status() {
        let reply = decode_one(b"+OK\r\n").unwrap().unwrap();
        assert_eq!(reply, Reply::Status("OK".to_string()));
        assert!(reply.is_ok_status());
        assert_eq!(reply.kind(), ReplyKind::Status);
    }

    #[test]
    fn test_decode_error() {
        let reply = decode_one(b"-ERR unknown command\r\n").unwrap().unwrap();
        assert!(reply.is_error());
        assert_eq!(reply.error_message(), Some("ERR unknown command"));
    }

    #[test]
    fn test_decode_integer() {
        let reply = decode_one(b":-42\r\n").unwrap().unwrap();
        assert_eq!(reply.as_integer(), Some(-42));
    }

    #[test]
    fn test_decode_bulk() {
        let reply = decode_one(b"$5\r\nhello\r\n").unwrap().unwrap();
        assert_eq!(reply.as_bulk(), Some(b"hello".as_slice()));
    }

    #[test]
    fn test_decode_bulk_with_crlf_payload() {
        let reply = decode_one(b"$4\r\na\r\nb\r\n").unwrap().unwrap();
        assert_eq!(reply.as_bulk(), Some(b"a\r\nb".as_slice()));
    }

    #[test]
    fn test_decode_nil_forms() {
        assert_eq!(decode_one(b"$-1\r\n").unwrap().unwrap(), Reply::Nil);
        assert_eq!(decode_one(b"*-1\r\n").unwrap().unwrap(), Reply::Nil);
    }

    #[test]
    fn test_decode_nested_array() {
        let wire = b"*3\r\n$3\r\nfoo\r\n:7\r\n*2\r\n+OK\r\n$-1\r\n";
        let reply = decode_one(wire).unwrap().unwrap();
        assert_eq!(
            reply,
            Reply::Array(vec![
                Reply::Bulk(Bytes::from_static(b"foo")),
                Reply::Integer(7),
                Reply::Array(vec![Reply::Status("OK".to_string()), Reply::Nil]),
            ])
        );
    }

    #[test]
    fn test_partial_reply_returns_none() {
        let mut decoder = Decoder::new();

        decoder.extend(b"$5\r\nhel");
        assert!(decoder.decode().unwrap().is_none());
        assert_eq!(decoder.buffered(), 8);

        decoder.extend(b"lo\r\n");
        let reply = decoder.decode().unwrap().unwrap();
        assert_eq!(reply.as_bulk(), Some(b"hello".as_slice()));
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_pipelined_replies_decode_in_order() {
        let mut decoder = Decoder::new();
        decoder.extend(b"+OK\r\n:1\r\n+PONG\r\n");

        assert_eq!(
            decoder.decode().unwrap().unwrap(),
            Reply::Status("OK".to_string())
        );
        assert_eq!(decoder.decode().unwrap().unwrap(), Reply::Integer(1));
        assert_eq!(
            decoder.decode().unwrap().unwrap(),
            Reply::Status("PONG".to_string())
        );
        assert!(decoder.decode().unwrap().is_none());
    }

    #[test]
    fn test_unknown_prefix_is_an_error() {
        let result = decode_one(b"?what\r\n");
        assert!(matches!(result, Err(ProtocolError::UnknownPrefix(b'?'))));
    }

    #[test]
    fn test_malformed_integer_is_an_error() {
        let result = decode_one(b":12ab\r\n");
        assert!(matches!(result, Err(ProtocolError::InvalidInteger)));
    }

    #[test]
    fn test_bulk_without_crlf_terminator_is_an_error() {
        let result = decode_one(b"$3\r\nabcXY");
        assert!(matches!(result, Err(ProtocolError::MissingCrlf)));
    }

    #[test]
    fn test_oversized_bulk_is_rejected() {
        let wire = format!("${}\r\n", MAX_BULK_LEN + 1);
        let result = decode_one(wire.as_bytes());
        assert!(matches!(result, Err(ProtocolError::BulkTooLarge { .. })));
    }

    #[test]
    fn test_oversized_array_is_rejected() {
        let wire = format!("*{}\r\n", MAX_ARRAY_LEN + 1);
        let result = decode_one(wire.as_bytes());
        assert!(matches!(result, Err(ProtocolError::ArrayTooLarge { .. })));
    }

    #[test]
    fn test_excessive_nesting_is_rejected() {
        let mut wire = Vec::new();
        for _ in 0..(MAX_DEPTH + 2) {
            wire.extend_from_slice(b"*1\r\n");
        }
        wire.extend_from_slice(b":0\r\n");
        let result = decode_one(&wire);
        assert!(matches!(result, Err(ProtocolError::DepthExceeded { .. })));
    }

    #[test]
    fn test_decode_on_empty_buffer() {
        let mut decoder = Decoder::new();
        assert!(decoder.decode().unwrap().is_none());
    }

    #[test]
    fn test_clear_discards_buffered_bytes() {
        let mut decoder = Decoder::new();
        decoder.extend(b"$5\r\nhel");
        decoder.clear();
        assert_eq!(decoder.buffered(), 0);
        assert!(decoder.decode().unwrap().is_none());
    }

    const SPLIT_WIRE: &[u8] = b"*3\r\n$3\r\nfoo\r\n:42\r\n+OK\r\n";

    fn split_wire_reply() -> Reply {
        Reply::Array(vec![
            Reply::Bulk(Bytes::from_static(b"foo")),
            Reply::Integer(42),
            Reply::Status("OK".to_string()),
        ])
    }

    proptest! {
        /// Feeding the same bytes in two chunks, split anywhere, parses the
        /// same reply as feeding them at once.
        #[test]
        fn decode_is_split_invariant(split in 1..SPLIT_WIRE.len()) {
            let mut decoder = Decoder::new();
            decoder.extend(&SPLIT_WIRE[..split]);
            let first = decoder.decode().unwrap();

            decoder.extend(&SPLIT_WIRE[split..]);
            let reply = match first {
                Some(reply) => reply,
                None => decoder.decode().unwrap().expect("complete after second chunk"),
            };

            prop_assert_eq!(reply, split_wire_reply());
            prop_assert_eq!(decoder.buffered(), 0);
        }
    }
}
