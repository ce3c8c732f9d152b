//! An upgraded WebSocket connection as seen by senders.
//!
//! A [`Client`] owns the write half of the socket behind an async mutex.
//! Every frame is encoded and written while holding that lock, so frames
//! from the telemetry pump, command replies and pongs never interleave.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, watch};
use tracing::trace;

use crate::error::{Error, Result};
use crate::identifiers::ClientId;
use crate::protocol::frame::{Opcode, write_frame};

// ============================================================================
// Types
// ============================================================================

/// Type-erased write half of a client socket.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Normal closure status code (1000).
const CLOSE_NORMAL: [u8; 2] = 1000u16.to_be_bytes();

// ============================================================================
// Client
// ============================================================================

/// Sending side of one open WebSocket connection.
pub struct Client {
    id: ClientId,
    writer: Mutex<BoxedWriter>,
    open: AtomicBool,
    closed: watch::Sender<bool>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Wraps the write half of an upgraded connection.
    #[must_use]
    pub fn new<W>(id: ClientId, writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            id,
            writer: Mutex::new(Box::new(writer)),
            open: AtomicBool::new(true),
            closed: watch::channel(false).0,
        }
    }

    /// Returns the client identifier.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> ClientId {
        self.id
    }

    /// Returns `false` once [`Client::close`] or [`Client::abort`] has run.
    #[inline]
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Resolves once the client has been closed or aborted.
    pub async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Shared writer, also used by the decoder to answer pings.
    pub(crate) fn writer(&self) -> &Mutex<BoxedWriter> {
        &self.writer
    }

    /// Sends one text frame.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the client was closed
    /// - [`Error::Io`] if the write fails
    pub async fn send(&self, text: &str) -> Result<()> {
        if !self.is_open() {
            return Err(Error::ConnectionClosed);
        }

        let mut writer = self.writer.lock().await;
        write_frame(&mut *writer, Opcode::Text, text.as_bytes()).await?;
        trace!(client_id = %self.id, len = text.len(), "Frame sent");
        Ok(())
    }

    /// Sends a close frame and shuts down the write half.
    ///
    /// Runs at most once; later calls return immediately. Failures are
    /// ignored since the peer may already be gone.
    pub async fn close(&self) {
        if !self.open.swap(false, Ordering::AcqRel) {
            return;
        }
        self.closed.send_replace(true);

        let mut writer = self.writer.lock().await;
        let _ = write_frame(&mut *writer, Opcode::Close, &CLOSE_NORMAL).await;
        let _ = writer.shutdown().await;
        trace!(client_id = %self.id, "Client closed");
    }

    /// Shuts down the write half without a close frame.
    ///
    /// Used after a failed or timed-out write, when a partial frame may
    /// already be on the wire and nothing more can be framed after it.
    pub async fn abort(&self) {
        if !self.open.swap(false, Ordering::AcqRel) {
            return;
        }
        self.closed.send_replace(true);

        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
        trace!(client_id = %self.id, "Client aborted");
    }
}

// ============================================================================
// Tests
// ============================================================================
