//! TCP accept loop for the dashboard server.
//!
//! # Connection Flow
//!
//! 1. [`ConnectionAcceptor::bind`] binds the listener (port 0 picks one)
//! 2. [`ConnectionAcceptor::spawn`] starts the accept loop on its own task
//! 3. Every accepted socket gets its own task running [`ConnectionHandler`]
//! 4. [`AcceptorHandle::stop`] ends the accept loop; open connections
//!    keep running until they close

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::Result;

use super::ConnectionHandler;

// ============================================================================
// Constants
// ============================================================================

/// Pause after a failed `accept` before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

// ============================================================================
// ConnectionAcceptor
// ============================================================================

/// A bound listener that has not started accepting yet.
#[derive(Debug)]
pub struct ConnectionAcceptor {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl ConnectionAcceptor {
    /// Binds the listener.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if binding fails.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        debug!(%local_addr, "Dashboard listener bound");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Returns the address actually bound.
    #[inline]
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Starts the accept loop.
    #[must_use]
    pub fn spawn(self, handler: Arc<ConnectionHandler>) -> AcceptorHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let local_addr = self.local_addr;
        let task = tokio::spawn(accept_loop(self.listener, handler, stop_rx));

        info!(%local_addr, "Dashboard server listening");

        AcceptorHandle {
            stop_tx,
            task,
            local_addr,
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    handler: Arc<ConnectionHandler>,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;

            _ = stop_rx.changed() => {
                debug!("Accept loop stopping");
                break;
            }

            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(?peer, "Connection accepted");
                    let handler = Arc::clone(&handler);
                    tokio::spawn(async move {
                        let state = handler.handle(stream, peer).await;
                        debug!(?peer, ?state, "Connection finished");
                    });
                }
                Err(e) => {
                    error!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
        }
    }
}

// ============================================================================
// AcceptorHandle
// ============================================================================

/// Controls a running accept loop.
#[derive(Debug)]
pub struct AcceptorHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
    local_addr: SocketAddr,
}

impl AcceptorHandle {
    /// Returns the listening address.
    #[inline]
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns `true` once the accept loop has ended.
    #[inline]
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops accepting and releases the listener.
    ///
    /// Waits for the accept loop to exit. Calling it again is a no-op.
    pub async fn stop(&mut self) {
        if self.task.is_finished() {
            return;
        }
        let _ = self.stop_tx.send(true);
        let _ = (&mut self.task).await;
        info!(local_addr = %self.local_addr, "Dashboard server stopped");
    }
}

// ============================================================================
// Tests
// ============================================================================
