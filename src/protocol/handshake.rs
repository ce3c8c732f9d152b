//! WebSocket opening handshake (RFC 6455 Section 4.2).
//!
//! ```http
//! GET /chat HTTP/1.1
//! Upgrade: websocket
//! Connection: Upgrade
//! Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==
//! ```
//!
//! is answered with
//!
//! ```http
//! HTTP/1.1 101 Switching Protocols
//! Upgrade: websocket
//! Connection: Upgrade
//! Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=
//! ```

// ============================================================================
// Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha1::{Digest, Sha1};

use super::http::RequestHead;

// ============================================================================
// Constants
// ============================================================================

/// RFC 6455 GUID appended to the client key.
const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

// ============================================================================
// Accept Token
// ============================================================================

/// Computes `Sec-WebSocket-Accept` from the client's `Sec-WebSocket-Key`.
///
/// `base64(SHA-1(key + GUID))`.
#[must_use]
pub fn compute_accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    STANDARD.encode(hasher.finalize())
}

// ============================================================================
// HandshakeRequest
// ============================================================================

/// The part of a request head that matters for the upgrade.
///
/// Consumed once to build the 101 response, then discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    key: String,
}

impl HandshakeRequest {
    /// Extracts the handshake from an upgrade request.
    ///
    /// Returns `None` when `Sec-WebSocket-Key` is absent or empty; the
    /// caller then drops the connection without answering.
    #[must_use]
    pub fn from_head(head: &RequestHead) -> Option<Self> {
        let key = head.header("sec-websocket-key")?;
        if key.is_empty() {
            return None;
        }
        Some(Self {
            key: key.to_string(),
        })
    }

    /// Returns the client key.
    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the accept token for this key.
    #[must_use]
    pub fn accept_key(&self) -> String {
        compute_accept_key(&self.key)
    }

    /// Renders the complete `101 Switching Protocols` response.
    #[must_use]
    pub fn response(&self) -> String {
        format!(
            "HTTP/1.1 101 Switching Protocols\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Accept: {}\r\n\
             \r\n",
            self.accept_key()
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc6455_vector() {
        assert_eq!(
            compute_accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn test_from_head_requires_key() {
        let head = RequestHead::parse("GET / HTTP/1.1", ["Upgrade: websocket"]).unwrap();
        assert!(HandshakeRequest::from_head(&head).is_none());

        let head = RequestHead::parse(
            "GET / HTTP/1.1",
            ["Upgrade: websocket", "Sec-WebSocket-Key:"],
        )
        .unwrap();
        assert!(HandshakeRequest::from_head(&head).is_none());
    }

    #[test]
    fn test_response_contains_accept() {
        let head = RequestHead::parse(
            "GET /anything HTTP/1.1",
            ["upgrade: WebSocket", "SEC-WEBSOCKET-KEY: dGhlIHNhbXBsZSBub25jZQ=="],
        )
        .unwrap();
        let handshake = HandshakeRequest::from_head(&head).unwrap();

        assert_eq!(handshake.key(), "dGhlIHNhbXBsZSBub25jZQ==");
        let response = handshake.response();
        assert!(response.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(response.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));
        assert!(response.ends_with("\r\n\r\n"));
    }
}
