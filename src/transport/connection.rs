//! Per-connection protocol negotiation and WebSocket session loop.
//!
//! # Connection Lifecycle
//!
//! ```text
//! ACCEPTED ─► NEGOTIATING ─┬─► HTTP_SERVED            (terminal)
//!                          ├─► ABORTED                (terminal)
//!                          └─► WS_OPEN ─► WS_CLOSED   (terminal)
//! ```
//!
//! Only `WS_OPEN` connections are in the [`ClientRegistry`]. A client is
//! registered right after the 101 response is written and removed when its
//! read loop ends, whatever the cause.

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::command::CommandSink;
use crate::error::{Error, Result};
use crate::identifiers::ClientId;
use crate::dashboard::ServerOptions;
use crate::protocol::frame::FrameDecoder;
use crate::protocol::handshake::HandshakeRequest;
use crate::protocol::http::{HttpResponder, RequestHead};

use super::{Client, ClientRegistry};

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of one accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Socket accepted, nothing read yet.
    Accepted,
    /// Reading the request head.
    Negotiating,
    /// Plain HTTP response written; connection closed.
    HttpServed,
    /// Dropped without a response (empty request, timeout, bad handshake).
    Aborted,
    /// Upgraded and registered.
    WsOpen,
    /// Upgraded connection ended and deregistered.
    WsClosed,
}

impl ConnectionState {
    /// Returns `true` for states a connection never leaves.
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::HttpServed | Self::Aborted | Self::WsClosed)
    }
}

// ============================================================================
// ConnectionHandler
// ============================================================================

/// Drives one accepted connection from request head to close.
///
/// Shared by every connection task of a server.
pub struct ConnectionHandler {
    registry: Arc<ClientRegistry>,
    responder: HttpResponder,
    sink: Arc<dyn CommandSink>,
    options: ServerOptions,
}

impl ConnectionHandler {
    /// Creates a handler.
    #[must_use]
    pub fn new(
        registry: Arc<ClientRegistry>,
        responder: HttpResponder,
        sink: Arc<dyn CommandSink>,
        options: ServerOptions,
    ) -> Self {
        Self {
            registry,
            responder,
            sink,
            options,
        }
    }

    /// Returns the registry clients are added to.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Handles an accepted TCP connection until it reaches a terminal state.
    pub async fn handle(&self, stream: TcpStream, peer: SocketAddr) -> ConnectionState {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(?peer, error = %e, "Failed to set TCP_NODELAY");
        }
        let (read_half, write_half) = stream.into_split();
        self.handle_io(read_half, write_half, peer).await
    }

    /// Handles a connection given as separate read and write halves.
    pub async fn handle_io<R, W>(&self, reader: R, mut writer: W, peer: SocketAddr) -> ConnectionState
    where
        R: AsyncRead + Send + Unpin,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let mut reader = BufReader::new(reader);
        trace!(?peer, state = ?ConnectionState::Accepted, "Connection accepted");
        debug!(?peer, state = ?ConnectionState::Negotiating, "Reading request head");

        let head = match self.read_head(&mut reader).await {
            Ok(Some(head)) => head,
            Ok(None) => {
                debug!(?peer, "Empty request, closing");
                return ConnectionState::Aborted;
            }
            Err(e) => {
                debug!(?peer, error = %e, "Negotiation failed");
                return ConnectionState::Aborted;
            }
        };

        if head.is_websocket_upgrade() {
            return self.run_websocket(head, reader, writer, peer).await;
        }

        match self.responder.respond(&mut writer, head.route_path()).await {
            Ok(status) => {
                debug!(?peer, path = head.path(), status, "HTTP request served");
                let _ = writer.shutdown().await;
                ConnectionState::HttpServed
            }
            Err(e) => {
                debug!(?peer, error = %e, "HTTP response failed");
                ConnectionState::Aborted
            }
        }
    }

    /// Reads the request head within the handshake window.
    async fn read_head<R>(&self, reader: &mut BufReader<R>) -> Result<Option<RequestHead>>
    where
        R: AsyncRead + Unpin,
    {
        let window = self.options.handshake_timeout;
        timeout(
            window,
            RequestHead::read(reader, self.options.max_header_bytes),
        )
        .await
        .map_err(|_| Error::handshake_timeout(duration_ms(window)))?
    }

    /// Completes the upgrade and runs the frame loop until the peer leaves.
    async fn run_websocket<R, W>(
        &self,
        head: RequestHead,
        mut reader: BufReader<R>,
        mut writer: W,
        peer: SocketAddr,
    ) -> ConnectionState
    where
        R: AsyncRead + Send + Unpin,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let Some(handshake) = HandshakeRequest::from_head(&head) else {
            debug!(?peer, "Upgrade without Sec-WebSocket-Key, closing");
            return ConnectionState::Aborted;
        };

        let response = handshake.response();
        if let Err(e) = write_all_flush(&mut writer, response.as_bytes()).await {
            debug!(?peer, error = %e, "Handshake response failed");
            return ConnectionState::Aborted;
        }

        let client = Arc::new(Client::new(ClientId::next(peer), writer));
        self.registry.add(Arc::clone(&client));
        info!(
            client_id = %client.id(),
            state = ?ConnectionState::WsOpen,
            clients = self.registry.len(),
            "Dashboard client connected"
        );

        if let Some(greeting) = &self.options.greeting {
            let _ = self.registry.send_to(&client, greeting).await;
        }

        let decoder = FrameDecoder::new(self.options.max_payload_size);
        loop {
            let message = tokio::select! {
                biased;
                () = client.closed() => {
                    debug!(client_id = %client.id(), "Client closed by server");
                    break;
                }
                message = decoder.next_message(&mut reader, client.writer()) => message,
            };
            match message {
                Ok(Some(command)) => self.dispatch(&client, command).await,
                Ok(None) => {
                    debug!(client_id = %client.id(), "Peer closed the connection");
                    break;
                }
                Err(e) => {
                    debug!(client_id = %client.id(), error = %e, "Connection lost");
                    break;
                }
            }
        }

        self.registry.remove(&client.id());
        client.close().await;
        info!(
            client_id = %client.id(),
            state = ?ConnectionState::WsClosed,
            clients = self.registry.len(),
            "Dashboard client disconnected"
        );

        ConnectionState::WsClosed
    }

    /// Runs the command sink and reports failures to the sender only.
    async fn dispatch(&self, client: &Client, command: String) {
        let sink = Arc::clone(&self.sink);
        let outcome = tokio::task::spawn_blocking(move || sink.on_command(&command)).await;

        let failure = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(join_error) if join_error.is_panic() => "command handler panicked".to_string(),
            Err(join_error) => join_error.to_string(),
        };

        warn!(client_id = %client.id(), error = %failure, "Command failed");
        let _ = self
            .registry
            .send_to(client, &format!("LOG:ERROR:{failure}"))
            .await;
    }
}

async fn write_all_flush<W>(writer: &mut W, bytes: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(bytes).await?;
    writer.flush().await?;
    Ok(())
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Tests
// ============================================================================
