//! Server tuning options.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use dashwire::ServerOptions;
//!
//! let options = ServerOptions::new()
//!     .with_telemetry_interval(Duration::from_millis(500))
//!     .with_greeting(Some("LOG:hello"));
//!
//! assert_eq!(options.greeting.as_deref(), Some("LOG:hello"));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::protocol::frame::DEFAULT_MAX_PAYLOAD_SIZE;
use crate::telemetry::DEFAULT_TELEMETRY_INTERVAL;
use crate::transport::DEFAULT_WRITE_TIMEOUT;

// ============================================================================
// Constants
// ============================================================================

/// Bound on reading the request head.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Bound on the size of the request head.
pub const DEFAULT_MAX_HEADER_BYTES: u64 = 16 * 1024;

/// First line every upgraded client receives.
pub const DEFAULT_GREETING: &str = "LOG:DASHBOARD: Connected. Telemetry active.";

// ============================================================================
// ServerOptions
// ============================================================================

/// Timeouts, limits and cadence of a dashboard server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    /// Time allowed to deliver the complete request head.
    pub handshake_timeout: Duration,

    /// Telemetry tick period.
    pub telemetry_interval: Duration,

    /// Bound on one delivery to one client during broadcast.
    pub write_timeout: Duration,

    /// Largest accepted inbound frame payload, in bytes.
    pub max_payload_size: u64,

    /// Largest accepted request head, in bytes.
    pub max_header_bytes: u64,

    /// Sent to each client right after the upgrade; `None` disables it.
    pub greeting: Option<String>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ServerOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            telemetry_interval: DEFAULT_TELEMETRY_INTERVAL,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
            greeting: Some(DEFAULT_GREETING.to_string()),
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ServerOptions {
    #[inline]
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_telemetry_interval(mut self, interval: Duration) -> Self {
        self.telemetry_interval = interval;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_max_payload_size(mut self, bytes: u64) -> Self {
        self.max_payload_size = bytes;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_max_header_bytes(mut self, bytes: u64) -> Self {
        self.max_header_bytes = bytes;
        self
    }

    /// Replaces the greeting; `None` sends nothing on connect.
    #[inline]
    #[must_use]
    pub fn with_greeting(mut self, greeting: Option<impl Into<String>>) -> Self {
        self.greeting = greeting.map(Into::into);
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
