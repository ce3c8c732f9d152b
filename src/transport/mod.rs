//! Connection handling for the dashboard server.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────┐   per socket   ┌─────────────────────┐
//! │ ConnectionAcceptor │ ─────────────► │ ConnectionHandler   │
//! │  (accept loop)     │   tokio task   │  HTTP or WebSocket  │
//! └────────────────────┘                └──────────┬──────────┘
//!                                                  │ add / remove
//!                                       ┌──────────▼──────────┐
//!                                       │   ClientRegistry    │
//!                                       │  Client → Client …  │
//!                                       └─────────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `client` | Write side of one upgraded connection |
//! | `connection` | Request negotiation and the frame loop |
//! | `registry` | Set of open clients and broadcast |
//! | `server` | Listener and accept loop |

// ============================================================================
// Submodules
// ============================================================================

/// Write side of one upgraded connection.
pub mod client;

/// Request negotiation and the per-client frame loop.
pub mod connection;

/// Registry of open clients.
pub mod registry;

/// Listener and accept loop.
pub mod server;

// ============================================================================
// Re-exports
// ============================================================================

pub use client::{BoxedWriter, Client};
pub use connection::{ConnectionHandler, ConnectionState};
pub use registry::{ClientRegistry, DEFAULT_WRITE_TIMEOUT};
pub use server::{AcceptorHandle, ConnectionAcceptor};
