//! Connection management: transport construction, pipelined send/recv,
//! session setup, and reconnect.

use crate::error::ClientError;
use crate::options::{ConnectionAddr, ConnectionOptions};
use crate::stream::Socket;
use bytes::BytesMut;
use redlink_protocol::{encode_command, CommandArgs, Decoder, Reply};
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::{Duration, Instant};

/// Chunk size for socket reads.
const READ_BUFFER_SIZE: usize = 8 * 1024;

/// One live transport: the socket plus its protocol buffers and validity
/// flag.
///
/// Owned exclusively by a single [`Connection`] and replaced wholesale on
/// reconnect, never shared or cloned.
#[derive(Debug)]
struct Transport {
    socket: Socket,
    decoder: Decoder,
    outbound: BytesMut,
    broken: bool,
}

impl Transport {
    fn new(socket: Socket) -> Self {
        Self {
            socket,
            decoder: Decoder::new(),
            outbound: BytesMut::with_capacity(256),
            broken: false,
        }
    }
}

/// Builds one configured transport from immutable options.
struct Connector<'a> {
    opts: &'a ConnectionOptions,
}

impl<'a> Connector<'a> {
    fn new(opts: &'a ConnectionOptions) -> Self {
        Self { opts }
    }

    fn connect(&self) -> Result<Transport, ClientError> {
        let socket = match &self.opts.addr {
            ConnectionAddr::Tcp { host, port } => self.connect_tcp(host, *port)?,
            ConnectionAddr::Unix { path } => self.connect_unix(path)?,
        };

        self.set_socket_timeout(&socket)?;
        self.enable_keep_alive(&socket)?;

        // Best effort: request/reply packets are small and latency-bound.
        socket.set_nodelay().ok();

        Ok(Transport::new(socket))
    }

    fn connect_tcp(&self, host: &str, port: u16) -> Result<Socket, ClientError> {
        let mut addrs = (host, port)
            .to_socket_addrs()
            .map_err(|source| self.resolve_error(source))?;
        let addr = addrs.next().ok_or_else(|| {
            self.resolve_error(std::io::Error::new(
                ErrorKind::NotFound,
                "hostname resolved to no addresses",
            ))
        })?;

        let stream = match effective_timeout(self.opts.connect_timeout) {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        }
        .map_err(|source| self.connect_error(source))?;

        Ok(Socket::Tcp(stream))
    }

    fn connect_unix(&self, path: &Path) -> Result<Socket, ClientError> {
        let stream = match effective_timeout(self.opts.connect_timeout) {
            // std has no timed Unix-domain connect, so go through socket2.
            Some(timeout) => {
                let socket =
                    socket2::Socket::new(socket2::Domain::UNIX, socket2::Type::STREAM, None)
                        .map_err(|source| self.resolve_error(source))?;
                let addr =
                    socket2::SockAddr::unix(path).map_err(|source| self.resolve_error(source))?;
                socket
                    .connect_timeout(&addr, timeout)
                    .map_err(|source| self.connect_error(source))?;
                UnixStream::from(socket)
            }
            None => UnixStream::connect(path).map_err(|source| self.connect_error(source))?,
        };

        Ok(Socket::Unix(stream))
    }

    fn set_socket_timeout(&self, socket: &Socket) -> Result<(), ClientError> {
        let Some(timeout) = effective_timeout(self.opts.socket_timeout) else {
            return Ok(());
        };
        socket
            .set_io_timeout(Some(timeout))
            .map_err(|source| ClientError::Configure {
                op: "set socket timeout",
                source,
            })
    }

    fn enable_keep_alive(&self, socket: &Socket) -> Result<(), ClientError> {
        if !self.opts.keep_alive {
            return Ok(());
        }
        socket
            .set_keep_alive()
            .map_err(|source| ClientError::Configure {
                op: "enable keep-alive",
                source,
            })
    }

    fn resolve_error(&self, source: std::io::Error) -> ClientError {
        ClientError::Resolve {
            addr: self.opts.addr.to_string(),
            source,
        }
    }

    fn connect_error(&self, source: std::io::Error) -> ClientError {
        ClientError::Connect {
            addr: self.opts.addr.to_string(),
            source,
        }
    }
}

/// Zero means "no deadline"; anything else is truncated to whole
/// microseconds before being handed to the OS. A value that truncates to
/// zero also means no deadline, since the OS treats a zero timeout as
/// blocking.
fn effective_timeout(timeout: Duration) -> Option<Duration> {
    let truncated = Duration::new(timeout.as_secs(), timeout.subsec_micros() * 1_000);
    if truncated.is_zero() {
        None
    } else {
        Some(truncated)
    }
}

/// A single logical connection to the store server.
///
/// Holds exactly one transport at all times. Pipelined use is N [`send`]
/// calls followed by N [`recv`] calls; replies come back in send order, as
/// the wire protocol carries no request IDs. Not safe for unsynchronized use
/// from multiple threads.
///
/// [`send`]: Connection::send
/// [`recv`]: Connection::recv
#[derive(Debug)]
pub struct Connection {
    transport: Transport,
    last_active: Instant,
    opts: ConnectionOptions,
}

impl Connection {
    /// Connects, configures the socket, and runs session setup (AUTH and
    /// SELECT as the options require).
    ///
    /// A connection is returned only once every setup reply came back OK; a
    /// rejected AUTH or SELECT fails construction outright.
    pub fn connect(opts: ConnectionOptions) -> Result<Self, ClientError> {
        tracing::debug!("connecting to {}", opts.addr);

        let transport = Connector::new(&opts).connect()?;
        let mut connection = Self {
            transport,
            last_active: Instant::now(),
            opts,
        };

        connection.setup()?;
        tracing::debug!("connection to {} established", connection.opts.addr);

        Ok(connection)
    }

    /// Serializes one command into the outbound buffer.
    ///
    /// Nothing touches the socket yet; [`recv`](Connection::recv) flushes.
    /// Calling `send` again before the first `recv` pipelines the commands.
    /// The argument slices are borrowed only for the duration of this call.
    pub fn send(&mut self, argv: &[&[u8]]) -> Result<(), ClientError> {
        encode_command(argv, &mut self.transport.outbound)?;
        debug_assert!(!self.transport.broken);
        Ok(())
    }

    /// [`send`](Connection::send) for an incrementally built argument
    /// vector.
    pub fn send_args(&mut self, args: &CommandArgs<'_>) -> Result<(), ClientError> {
        self.send(args.as_slices())
    }

    /// Flushes pending commands and blocks until one full reply arrives or
    /// the socket timeout elapses.
    ///
    /// A well-formed server error reply is returned as
    /// [`ClientError::Server`] and leaves the connection usable; transport
    /// and parse failures mark it broken.
    pub fn recv(&mut self) -> Result<Reply, ClientError> {
        self.flush_outbound()?;

        loop {
            match self.transport.decoder.decode() {
                Ok(Some(reply)) => {
                    self.last_active = Instant::now();
                    if let Reply::Error(message) = reply {
                        return Err(ClientError::Server(message));
                    }
                    return Ok(reply);
                }
                Ok(None) => {}
                Err(err) => {
                    self.transport.broken = true;
                    tracing::debug!("malformed reply from {}: {}", self.opts.addr, err);
                    return Err(err.into());
                }
            }

            let mut buf = [0u8; READ_BUFFER_SIZE];
            let n = match self.transport.socket.read(&mut buf) {
                Ok(n) => n,
                Err(err) => return Err(self.fatal_io(err)),
            };
            if n == 0 {
                self.transport.broken = true;
                tracing::debug!("server {} closed the connection", self.opts.addr);
                return Err(ClientError::ConnectionClosed);
            }
            self.transport.decoder.extend(&buf[..n]);
        }
    }

    /// Non-blocking query of the transport's fatal-error flag.
    pub fn broken(&self) -> bool {
        self.transport.broken
    }

    /// Replaces the transport by building a complete new connection from the
    /// stored options, session setup included, then swapping it in.
    ///
    /// All or nothing: if the rebuild fails at any step the existing state
    /// is left untouched, so a broken connection stays broken rather than
    /// half-swapped.
    pub fn reconnect(&mut self) -> Result<(), ClientError> {
        tracing::debug!("reconnecting to {}", self.opts.addr);
        let fresh = Connection::connect(self.opts.clone())?;
        *self = fresh;
        Ok(())
    }

    /// Options this connection was built from.
    pub fn options(&self) -> &ConnectionOptions {
        &self.opts
    }

    /// Instant of the most recent successful I/O.
    ///
    /// Informational state for pool health checks; the connection itself
    /// never acts on it.
    pub fn last_active(&self) -> Instant {
        self.last_active
    }

    fn flush_outbound(&mut self) -> Result<(), ClientError> {
        if self.transport.outbound.is_empty() {
            return Ok(());
        }

        let pending = self.transport.outbound.split();
        if let Err(err) = self.transport.socket.write_all(&pending) {
            return Err(self.fatal_io(err));
        }
        if let Err(err) = self.transport.socket.flush() {
            return Err(self.fatal_io(err));
        }

        self.last_active = Instant::now();
        Ok(())
    }

    /// Marks the transport broken and classifies the I/O failure.
    fn fatal_io(&mut self, err: std::io::Error) -> ClientError {
        self.transport.broken = true;
        tracing::debug!("transport failure on {}: {}", self.opts.addr, err);
        match err.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut => ClientError::Timeout,
            ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof => ClientError::ConnectionClosed,
            _ => ClientError::Io(err),
        }
    }

    // Session setup runs once per transport, immediately after connect. It
    // establishes the invariants (authenticated, correct namespace) every
    // later command on this connection depends on.
    fn setup(&mut self) -> Result<(), ClientError> {
        self.auth()?;
        self.select_db()?;
        Ok(())
    }

    fn auth(&mut self) -> Result<(), ClientError> {
        let Some(password) = self.opts.password.clone() else {
            return Ok(());
        };
        tracing::debug!("authenticating session");
        self.send(&[b"AUTH", password.as_bytes()])?;
        self.expect_ok("AUTH")
    }

    fn select_db(&mut self) -> Result<(), ClientError> {
        if self.opts.db == 0 {
            return Ok(());
        }
        tracing::debug!("selecting database {}", self.opts.db);
        let index = self.opts.db.to_string();
        self.send(&[b"SELECT", index.as_bytes()])?;
        self.expect_ok("SELECT")
    }

    fn expect_ok(&mut self, command: &'static str) -> Result<(), ClientError> {
        let reply = self.recv()?;
        if reply.is_ok_status() {
            Ok(())
        } else {
            Err(ClientError::UnexpectedReply {
                command,
                kind: reply.kind(),
            })
        }
    }
}
