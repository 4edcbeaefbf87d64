//! Per-client connection loop.
//!
//! Bytes are accumulated in a `BytesMut` because a read can end halfway
//! through a line or carry several lines at once. Each complete line goes to
//! the client's [`Session`]; the reply is written back followed by `\n`.
//! A `stop` reply is sent and then the connection is closed.

use crate::commands::CommandRegistry;
use crate::protocol::{parse_line, LineError, Reply};
use crate::session::Session;
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

const INITIAL_BUFFER_SIZE: usize = 4096;

/// Server-wide connection counters.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    pub connections_accepted: AtomicU64,
    pub active_connections: AtomicU64,
    /// Request lines handled, including queued ones
    pub requests_handled: AtomicU64,
    pub bytes_read: AtomicU64,
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    fn closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    fn record_request(&self, read: usize, written: usize) {
        self.requests_handled.fetch_add(1, Ordering::Relaxed);
        self.bytes_read.fetch_add(read as u64, Ordering::Relaxed);
        self.bytes_written.fetch_add(written as u64, Ordering::Relaxed);
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] LineError),

    /// The client closed the socket between requests
    #[error("client disconnected")]
    ClientDisconnected,

    /// The client closed the socket in the middle of a line
    #[error("unexpected end of stream with {0} bytes buffered")]
    UnexpectedEof(usize),
}

impl ConnectionError {
    /// True for the ways a client normally goes away.
    fn is_disconnect(&self) -> bool {
        match self {
            ConnectionError::ClientDisconnected => true,
            ConnectionError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

/// One connected client: its socket, read buffer and session.
pub struct ConnectionHandler {
    stream: BufWriter<TcpStream>,
    addr: SocketAddr,
    buffer: BytesMut,
    session: Session,
    stats: Arc<ConnectionStats>,
}

impl ConnectionHandler {
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        registry: Arc<CommandRegistry>,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.opened();
        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            session: Session::new(registry),
            stats,
        }
    }

    /// Serves the client until it sends `quit`/`exit`, disconnects or errors.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.serve().await;
        match &result {
            Ok(()) => info!(client = %self.addr, "Client quit"),
            Err(e) if e.is_disconnect() => debug!(client = %self.addr, "Client disconnected"),
            Err(e) => warn!(client = %self.addr, error = %e, "Connection closed with error"),
        }

        self.stats.closed();
        result
    }

    async fn serve(&mut self) -> Result<(), ConnectionError> {
        loop {
            while let Some((line, consumed)) = parse_line(&self.buffer)? {
                let _ = self.buffer.split_to(consumed);
                trace!(client = %self.addr, line = %line, "Request");

                let reply = self.session.handle(&line);
                let written = self.write_reply(&reply).await?;
                self.stats.record_request(consumed, written);

                if reply.is_stop() {
                    return Ok(());
                }
            }

            self.fill_buffer().await?;
        }
    }

    async fn fill_buffer(&mut self) -> Result<(), ConnectionError> {
        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;
        if n == 0 {
            return Err(if self.buffer.is_empty() {
                ConnectionError::ClientDisconnected
            } else {
                ConnectionError::UnexpectedEof(self.buffer.len())
            });
        }

        trace!(client = %self.addr, bytes = n, buffered = self.buffer.len(), "Read");
        Ok(())
    }

    async fn write_reply(&mut self, reply: &Reply) -> Result<usize, ConnectionError> {
        let mut out = reply.to_string();
        out.push('\n');
        self.stream.write_all(out.as_bytes()).await?;
        self.stream.flush().await?;
        Ok(out.len())
    }
}

/// Runs a [`ConnectionHandler`] to completion, logging only unusual endings.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    registry: Arc<CommandRegistry>,
    stats: Arc<ConnectionStats>,
) {
    let handler = ConnectionHandler::new(stream, addr, registry, stats);
    if let Err(e) = handler.run().await {
        if !e.is_disconnect() {
            debug!(client = %addr, error = %e, "Connection task finished with error");
        }
    }
}
