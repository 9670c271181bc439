//! # redlink
//!
//! Synchronous client connection core for RESP key-value stores.
//!
//! The workspace splits into two crates, both re-exported here:
//! - `redlink-protocol`: RESP2 command encoding and reply parsing
//! - `redlink-client`: blocking TCP/Unix transports, pipelined send/recv,
//!   session setup, and reconnect
//!
//! ```no_run
//! use redlink::{Connection, ConnectionOptions, Reply};
//!
//! # fn main() -> Result<(), redlink::ClientError> {
//! let opts = ConnectionOptions::tcp("127.0.0.1", 6379);
//! let mut conn = Connection::connect(opts)?;
//!
//! conn.send(&[b"PING"])?;
//! match conn.recv()? {
//!     Reply::Status(s) => println!("{}", s),
//!     other => println!("unexpected reply kind: {:?}", other.kind()),
//! }
//! # Ok(())
//! # }
//! ```

pub use redlink_client::{ClientError, Connection, ConnectionAddr, ConnectionOptions};
pub use redlink_protocol::{CommandArgs, Decoder, ProtocolError, Reply, ReplyKind, DEFAULT_PORT};
