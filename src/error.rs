//! Error types for the dashboard server.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use dashwire::{Dashboard, Result};
//!
//! async fn example() -> Result<()> {
//!     let dashboard = Dashboard::builder().asset_file("./dashboard.html").start().await?;
//!     dashboard.broadcast("LOG:hello").await;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::Asset`] |
//! | Transport | [`Error::Io`], [`Error::ConnectionClosed`], [`Error::HandshakeTimeout`] |
//! | Protocol | [`Error::Protocol`], [`Error::PayloadTooLarge`] |
//! | Registry | [`Error::ClientNotFound`] |
//! | Application | [`Error::Command`], [`Error::Sample`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::{Error as IoError, ErrorKind};
use std::result::Result as StdResult;

use thiserror::Error;

use crate::identifiers::ClientId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Nothing in this crate is process-fatal: every variant is scoped to one
/// connection, one metric read, or one command.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when the dashboard builder is given invalid settings.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Dashboard asset could not be loaded.
    #[error("Asset error: {message}")]
    Asset {
        /// Description of the asset failure.
        message: String,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Peer closed the connection, possibly in the middle of a frame.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Request head was not received within the handshake window.
    #[error("Handshake timeout after {timeout_ms}ms")]
    HandshakeTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Malformed request or frame.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// Inbound frame announced a payload larger than allowed.
    #[error("Payload too large: {size} bytes (max: {max})")]
    PayloadTooLarge {
        /// Announced payload length.
        size: u64,
        /// Configured maximum.
        max: u64,
    },

    // ========================================================================
    // Registry Errors
    // ========================================================================
    /// Client is not registered.
    #[error("Client not found: {client_id}")]
    ClientNotFound {
        /// The missing client.
        client_id: ClientId,
    },

    // ========================================================================
    // Application Errors
    // ========================================================================
    /// Command handler failure.
    ///
    /// Displays as the bare message so it can be forwarded to the
    /// originating client as `LOG:ERROR:<message>`.
    #[error("{message}")]
    Command {
        /// Message reported back to the client.
        message: String,
    },

    /// Reading one telemetry metric failed.
    #[error("Failed to sample {metric}: {message}")]
    Sample {
        /// Wire key of the metric being sampled.
        metric: &'static str,
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an asset error.
    #[inline]
    pub fn asset(message: impl Into<String>) -> Self {
        Self::Asset {
            message: message.into(),
        }
    }

    /// Creates a handshake timeout error.
    #[inline]
    pub fn handshake_timeout(timeout_ms: u64) -> Self {
        Self::HandshakeTimeout { timeout_ms }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a payload too large error.
    #[inline]
    pub fn payload_too_large(size: u64, max: u64) -> Self {
        Self::PayloadTooLarge { size, max }
    }

    /// Creates a client not found error.
    #[inline]
    pub fn client_not_found(client_id: ClientId) -> Self {
        Self::ClientNotFound { client_id }
    }

    /// Creates a command handler error.
    #[inline]
    pub fn command(message: impl Into<String>) -> Self {
        Self::Command {
            message: message.into(),
        }
    }

    /// Creates a metric sampling error.
    #[inline]
    pub fn sample(metric: &'static str, message: impl Into<String>) -> Self {
        Self::Sample {
            metric,
            message: message.into(),
        }
    }

    /// Maps an I/O error from a frame read.
    ///
    /// `UnexpectedEof` means the peer vanished mid-frame.
    pub(crate) fn from_read(err: IoError) -> Self {
        if err.kind() == ErrorKind::UnexpectedEof {
            Self::ConnectionClosed
        } else {
            Self::Io(err)
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error ends only the affected connection.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::ConnectionClosed | Self::HandshakeTimeout { .. } | Self::Io(_)
        )
    }

    /// Returns `true` if the peer violated the wire protocol.
    #[inline]
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Self::Protocol { .. } | Self::PayloadTooLarge { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::protocol("unmasked client frame");
        assert_eq!(err.to_string(), "Protocol error: unmasked client frame");
    }

    #[test]
    fn test_command_error_displays_bare_message() {
        let err = Error::command("unknown command: warp");
        assert_eq!(err.to_string(), "unknown command: warp");
        assert_eq!(format!("LOG:ERROR:{err}"), "LOG:ERROR:unknown command: warp");
    }

    #[test]
    fn test_sample_error_display() {
        let err = Error::sample("SPEED", "physics offline");
        assert_eq!(err.to_string(), "Failed to sample SPEED: physics offline");
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::ConnectionClosed.is_connection_error());
        assert!(Error::handshake_timeout(30_000).is_connection_error());
        assert!(!Error::config("test").is_connection_error());
    }

    #[test]
    fn test_is_protocol_error() {
        assert!(Error::protocol("bad").is_protocol_error());
        assert!(Error::payload_too_large(10, 5).is_protocol_error());
        assert!(!Error::ConnectionClosed.is_protocol_error());
    }

    #[test]
    fn test_from_read_maps_eof_to_closed() {
        let eof = IoError::new(ErrorKind::UnexpectedEof, "eof");
        assert!(matches!(Error::from_read(eof), Error::ConnectionClosed));

        let reset = IoError::new(ErrorKind::ConnectionReset, "reset");
        assert!(matches!(Error::from_read(reset), Error::Io(_)));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
