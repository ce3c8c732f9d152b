//! Type-safe identifiers for dashboard clients.
//!
//! A [`ClientId`] pairs the peer address with a process-wide sequence
//! number, so two connections from the same address never collide.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// ClientId
// ============================================================================

/// Next sequence number handed out by [`ClientId::next`].
static NEXT_CLIENT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier of one upgraded WebSocket connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId {
    peer: SocketAddr,
    seq: u64,
}

impl ClientId {
    /// Allocates a fresh identifier for a connection from `peer`.
    #[must_use]
    pub fn next(peer: SocketAddr) -> Self {
        Self {
            peer,
            seq: NEXT_CLIENT_SEQ.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Returns the remote address of the connection.
    #[inline]
    #[must_use]
    pub const fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Returns the sequence number.
    #[inline]
    #[must_use]
    pub const fn seq(&self) -> u64 {
        self.seq
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.peer, self.seq)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::{IpAddr, Ipv4Addr};

    fn addr() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 40_000)
    }

    #[test]
    fn test_next_is_unique_for_same_peer() {
        let a = ClientId::next(addr());
        let b = ClientId::next(addr());
        assert_ne!(a, b);
        assert!(b.seq() > a.seq());
        assert_eq!(a.peer(), b.peer());
    }

    #[test]
    fn test_display() {
        let id = ClientId::next(addr());
        assert_eq!(id.to_string(), format!("127.0.0.1:40000#{}", id.seq()));
    }
}
