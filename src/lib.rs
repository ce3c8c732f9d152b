//! Dashwire - Embedded dashboard server with live WebSocket telemetry.
//!
//! Serves one dashboard page over plain HTTP and upgrades WebSocket
//! requests on the same port. Connected dashboards receive one
//! `KEY:value` text frame per metric every second, and whatever they send
//! back is handed to a command callback.
//!
//! # Architecture
//!
//! ```text
//!  browser ──HTTP GET /──────────► HttpResponder ──► dashboard page
//!  browser ──Upgrade: websocket──► ConnectionHandler
//!                                    │ register
//!                                    ▼
//!  MetricsSource ─► TelemetryPump ─► ClientRegistry ─► every client
//!                                    ▲
//!  CommandSink ◄── inbound frames ───┘  (errors go back as LOG:ERROR:…)
//! ```
//!
//! Key design principles:
//!
//! - One task per connection; the registry is the only shared mutable set
//! - RFC 6455 framing is implemented directly, with no WebSocket library
//! - A failing client or metric never affects the others
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use dashwire::{Dashboard, Error, Result, SharedState, SystemMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let state = Arc::new(SharedState::new());
//!     let commands = Arc::clone(&state);
//!
//!     let dashboard = Dashboard::builder()
//!         .port(8080)
//!         .asset_file("./dashboard.html")
//!         .metrics_source(Arc::clone(&state))
//!         .on_command(move |command: &str| -> Result<()> {
//!             match command {
//!                 "defense" => commands.set_mode(SystemMode::Defense),
//!                 "neutral" => commands.set_mode(SystemMode::Neutral),
//!                 other => return Err(Error::command(format!("Unknown command: {other}"))),
//!             }
//!             Ok(())
//!         })
//!         .start()
//!         .await?;
//!
//!     println!("Dashboard at {}", dashboard.http_url());
//!     tokio::signal::ctrl_c().await?;
//!     dashboard.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`asset`] | Dashboard page sources |
//! | [`command`] | Inbound message callback |
//! | [`dashboard`] | Server handle, builder and options |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Client identifiers |
//! | [`protocol`] | HTTP, handshake and frame codec |
//! | [`state`] | Shared system state |
//! | [`telemetry`] | Metric sampling and the tick loop |
//! | [`transport`] | Accept loop, connections and client registry |

// ============================================================================
// Modules
// ============================================================================

/// Dashboard page sources.
pub mod asset;

/// Inbound message callback.
pub mod command;

/// Server handle and configuration.
///
/// Use [`Dashboard::builder()`] to start a server.
pub mod dashboard;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Client identifiers.
pub mod identifiers;

/// Wire protocol: HTTP request heads, WebSocket handshake and frames.
pub mod protocol;

/// Shared system state.
pub mod state;

/// Metric sampling and periodic broadcast.
pub mod telemetry;

/// Accept loop, per-connection handling and the client registry.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Server types
pub use dashboard::{Dashboard, DashboardBuilder, ServerOptions};

// Asset types
pub use asset::{AssetSource, DashboardAsset};

// Command types
pub use command::{CommandSink, IgnoreCommands};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::ClientId;

// State and telemetry types
pub use state::SharedState;
pub use telemetry::{Metric, MetricsSource, SystemMode, TelemetryPump, TelemetrySample};

// Transport types
pub use transport::{Client, ClientRegistry};
