//! Running dashboard server.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;
use tracing::info;

use crate::asset::DashboardAsset;
use crate::command::CommandSink;
use crate::error::Result;
use crate::protocol::http::HttpResponder;
use crate::telemetry::{MetricsSource, TelemetryPump};
use crate::transport::{AcceptorHandle, ClientRegistry, ConnectionAcceptor, ConnectionHandler};

use super::ServerOptions;
use super::builder::DashboardBuilder;

// ============================================================================
// Dashboard
// ============================================================================

/// A bound server streaming telemetry to every connected dashboard.
///
/// Dropping it stops accepting and stops the telemetry pump; clients that
/// are already connected stay connected until they leave. Use
/// [`shutdown`](Self::shutdown) to close them too.
pub struct Dashboard {
    local_addr: SocketAddr,
    registry: Arc<ClientRegistry>,
    pump: Arc<TelemetryPump>,
    acceptor: Mutex<AcceptorHandle>,
    running: AtomicBool,
}

impl fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dashboard")
            .field("local_addr", &self.local_addr)
            .field("clients", &self.registry.len())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Dashboard - Lifecycle
// ============================================================================

impl Dashboard {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> DashboardBuilder {
        DashboardBuilder::new()
    }

    /// Binds, then starts the accept loop and the telemetry pump.
    pub(crate) async fn launch(
        addr: SocketAddr,
        asset: DashboardAsset,
        alias: Option<String>,
        sink: Arc<dyn CommandSink>,
        source: Arc<dyn MetricsSource>,
        options: ServerOptions,
    ) -> Result<Self> {
        let acceptor = ConnectionAcceptor::bind(addr).await?;
        let local_addr = acceptor.local_addr();

        let registry = Arc::new(ClientRegistry::with_write_timeout(options.write_timeout));
        let pump = Arc::new(TelemetryPump::new(
            Arc::clone(&registry),
            source,
            options.telemetry_interval,
        ));

        let handler = Arc::new(ConnectionHandler::new(
            Arc::clone(&registry),
            HttpResponder::new(asset, alias),
            sink,
            options,
        ));

        let handle = acceptor.spawn(handler);
        tokio::spawn(Arc::clone(&pump).run());

        info!(%local_addr, "Dashboard started");

        Ok(Self {
            local_addr,
            registry,
            pump,
            acceptor: Mutex::new(handle),
            running: AtomicBool::new(true),
        })
    }

    /// Stops accepting connections and stops the telemetry pump.
    ///
    /// Open client connections are left alone.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        self.pump.stop();
        self.acceptor.lock().await.stop().await;
    }

    /// Stops the server and disconnects every client.
    pub async fn shutdown(&self) {
        self.stop().await;
        self.registry.disconnect_all().await;
        info!(local_addr = %self.local_addr, "Dashboard shut down");
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        // Dropping the acceptor handle ends the accept loop.
        self.pump.stop();
    }
}

// ============================================================================
// Dashboard - Accessors
// ============================================================================

impl Dashboard {
    /// Returns the bound address.
    #[inline]
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the bound port.
    #[inline]
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// URL of the dashboard page.
    #[must_use]
    pub fn http_url(&self) -> String {
        format!("http://{}/", self.local_addr)
    }

    /// URL for WebSocket clients.
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}/", self.local_addr)
    }

    /// Registry of connected clients.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Number of connected WebSocket clients.
    #[inline]
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.registry.len()
    }

    /// Returns `false` after [`stop`](Self::stop) or [`shutdown`](Self::shutdown).
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Sends one line to every connected client.
    ///
    /// Returns the number of clients it reached.
    pub async fn broadcast(&self, line: &str) -> usize {
        self.registry.broadcast(line).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::time::timeout;

    use crate::error::Error;
    use crate::protocol::frame::{Opcode, encode_masked_frame};
    use crate::state::SharedState;
    use crate::telemetry::SystemMode;

    const PAGE: &str = "<!doctype html><title>dash</title>";
    const MASK: [u8; 4] = [0x37, 0xfa, 0x21, 0x3d];

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("dashwire=debug")
            .with_test_writer()
            .try_init();
    }

    fn quiet() -> ServerOptions {
        ServerOptions::new()
            .with_telemetry_interval(Duration::from_secs(3600))
            .with_greeting(None::<String>)
    }

    /// Opens a WebSocket and consumes the 101 response head.
    async fn connect(dashboard: &Dashboard) -> TcpStream {
        let mut stream = TcpStream::connect(dashboard.local_addr()).await.unwrap();
        stream
            .write_all(
                b"GET / HTTP/1.1\r\n\
                  Host: localhost\r\n\
                  Upgrade: websocket\r\n\
                  Connection: Upgrade\r\n\
                  Sec-WebSocket-Version: 13\r\n\
                  Sec-WebSocket-Key: x3JJHMbDL1EzLkh9GBhXDw==\r\n\r\n",
            )
            .await
            .unwrap();

        let mut head = Vec::new();
        while !head.ends_with(b"\r\n\r\n") {
            head.push(stream.read_u8().await.unwrap());
        }
        let head = String::from_utf8(head).unwrap();
        assert!(head.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(head.contains("Sec-WebSocket-Accept: HSmrc0sMlYUkAGmm5OPpG2HaGWk=\r\n"));
        stream
    }

    /// Reads one unmasked server frame.
    async fn read_frame(stream: &mut TcpStream) -> (u8, Vec<u8>) {
        let first = stream.read_u8().await.unwrap();
        let second = stream.read_u8().await.unwrap();
        assert_eq!(second & 0x80, 0, "server frames are never masked");
        let len = match second & 0x7f {
            126 => u64::from(stream.read_u16().await.unwrap()),
            127 => stream.read_u64().await.unwrap(),
            n => u64::from(n),
        };
        let mut payload = vec![0u8; usize::try_from(len).unwrap()];
        stream.read_exact(&mut payload).await.unwrap();
        (first & 0x0f, payload)
    }

    async fn read_text(stream: &mut TcpStream) -> String {
        let (opcode, payload) = read_frame(stream).await;
        assert_eq!(opcode, 0x1);
        String::from_utf8(payload).unwrap()
    }

    async fn wait_for_line(stream: &mut TcpStream, line: &str, within: Duration) {
        timeout(within, async {
            loop {
                if read_text(stream).await == line {
                    break;
                }
            }
        })
        .await
        .unwrap_or_else(|_| panic!("did not receive {line}"));
    }

    async fn wait_for_clients(dashboard: &Dashboard, count: usize) {
        for _ in 0..100 {
            if dashboard.client_count() == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(dashboard.client_count(), count);
    }

    #[tokio::test]
    async fn test_http_serves_exact_asset() {
        init_tracing();
        let dashboard = Dashboard::builder()
            .asset_inline(PAGE)
            .options(quiet())
            .start()
            .await
            .unwrap();

        let mut stream = TcpStream::connect(dashboard.local_addr()).await.unwrap();
        stream
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.contains(&format!("Content-Length: {}\r\n", PAGE.len())));
        assert!(response.contains("Connection: close\r\n"));
        assert!(response.contains("Access-Control-Allow-Origin: *\r\n"));
        assert!(response.ends_with(PAGE));
        assert_eq!(dashboard.client_count(), 0);

        dashboard.shutdown().await;
    }

    #[tokio::test]
    async fn test_client_receives_greeting_then_state() {
        init_tracing();
        let dashboard = Dashboard::builder()
            .asset_inline(PAGE)
            .start()
            .await
            .unwrap();

        let mut stream = connect(&dashboard).await;
        assert_eq!(
            read_text(&mut stream).await,
            crate::dashboard::options::DEFAULT_GREETING
        );
        wait_for_line(&mut stream, "STATE:NEUTRAL", Duration::from_millis(1100)).await;

        dashboard.shutdown().await;
    }

    #[tokio::test]
    async fn test_command_changes_reported_state() {
        init_tracing();
        let state = Arc::new(SharedState::new());
        let sink_state = Arc::clone(&state);

        let dashboard = Dashboard::builder()
            .asset_inline(PAGE)
            .options(
                ServerOptions::new()
                    .with_telemetry_interval(Duration::from_millis(50))
                    .with_greeting(None::<String>),
            )
            .metrics_source(Arc::clone(&state))
            .on_command(move |command: &str| -> crate::Result<()> {
                if command == "defense" {
                    sink_state.set_mode(SystemMode::Defense);
                }
                Ok(())
            })
            .start()
            .await
            .unwrap();

        let mut stream = connect(&dashboard).await;
        stream
            .write_all(&encode_masked_frame(Opcode::Text, b"defense", MASK))
            .await
            .unwrap();

        wait_for_line(&mut stream, "STATE:DEFENSE", Duration::from_secs(2)).await;
        wait_for_line(&mut stream, "STRESS:0.30", Duration::from_secs(2)).await;

        dashboard.shutdown().await;
    }

    #[tokio::test]
    async fn test_command_error_goes_only_to_sender() {
        init_tracing();
        let dashboard = Dashboard::builder()
            .asset_inline(PAGE)
            .options(quiet())
            .on_command(|command: &str| -> crate::Result<()> {
                Err(Error::command(format!("Unknown command: {command}")))
            })
            .start()
            .await
            .unwrap();

        let mut sender = connect(&dashboard).await;
        let mut bystander = connect(&dashboard).await;
        wait_for_clients(&dashboard, 2).await;

        sender
            .write_all(&encode_masked_frame(Opcode::Text, b"warp", MASK))
            .await
            .unwrap();

        assert_eq!(read_text(&mut sender).await, "LOG:ERROR:Unknown command: warp");
        assert!(
            timeout(Duration::from_millis(200), read_frame(&mut bystander))
                .await
                .is_err()
        );
        assert_eq!(dashboard.client_count(), 2);

        dashboard.shutdown().await;
    }

    #[tokio::test]
    async fn test_ping_is_answered_with_pong() {
        init_tracing();
        let dashboard = Dashboard::builder()
            .asset_inline(PAGE)
            .options(quiet())
            .start()
            .await
            .unwrap();

        let mut stream = connect(&dashboard).await;
        stream
            .write_all(&encode_masked_frame(Opcode::Ping, b"beat", MASK))
            .await
            .unwrap();

        assert_eq!(read_frame(&mut stream).await, (0xA, b"beat".to_vec()));

        dashboard.shutdown().await;
    }

    #[tokio::test]
    async fn test_broadcast_and_disconnect_cleanup() {
        init_tracing();
        let dashboard = Dashboard::builder()
            .asset_inline(PAGE)
            .options(quiet())
            .start()
            .await
            .unwrap();

        let mut first = connect(&dashboard).await;
        let mut second = connect(&dashboard).await;
        wait_for_clients(&dashboard, 2).await;

        assert_eq!(dashboard.broadcast("LOG:hello").await, 2);
        assert_eq!(read_text(&mut first).await, "LOG:hello");
        assert_eq!(read_text(&mut second).await, "LOG:hello");

        drop(second);
        wait_for_clients(&dashboard, 1).await;

        assert_eq!(dashboard.broadcast("LOG:again").await, 1);
        assert_eq!(read_text(&mut first).await, "LOG:again");

        dashboard.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_closes_clients_and_listener() {
        init_tracing();
        let dashboard = Dashboard::builder()
            .asset_inline(PAGE)
            .options(quiet())
            .start()
            .await
            .unwrap();
        let addr = dashboard.local_addr();

        let mut stream = connect(&dashboard).await;
        wait_for_clients(&dashboard, 1).await;

        dashboard.shutdown().await;

        assert!(!dashboard.is_running());
        assert_eq!(dashboard.client_count(), 0);
        let (opcode, _) = read_frame(&mut stream).await;
        assert_eq!(opcode, 0x8);
        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_stop_keeps_open_clients() {
        init_tracing();
        let dashboard = Dashboard::builder()
            .asset_inline(PAGE)
            .options(quiet())
            .start()
            .await
            .unwrap();

        let mut stream = connect(&dashboard).await;
        wait_for_clients(&dashboard, 1).await;

        dashboard.stop().await;
        assert!(!dashboard.is_running());
        assert_eq!(dashboard.broadcast("LOG:still here").await, 1);
        assert_eq!(read_text(&mut stream).await, "LOG:still here");

        dashboard.shutdown().await;
    }

    #[test]
    fn test_urls() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let dashboard = Dashboard::builder()
                .asset_inline(PAGE)
                .start()
                .await
                .unwrap();
            let port = dashboard.port();
            assert_eq!(dashboard.http_url(), format!("http://127.0.0.1:{port}/"));
            assert_eq!(dashboard.ws_url(), format!("ws://127.0.0.1:{port}/"));
        });
    }
}
