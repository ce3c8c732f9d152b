//! Registry of open WebSocket clients.
//!
//! Holds every upgraded connection for its whole open lifetime and fans
//! messages out to all of them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            ClientRegistry               │
//! │  ┌─────────────────────────────────┐    │
//! │  │ 127.0.0.1:50412#1 → Client      │    │
//! │  │ 127.0.0.1:50418#2 → Client      │    │
//! │  │ 10.0.0.7:61002#3  → Client      │    │
//! │  └─────────────────────────────────┘    │
//! └─────────────────────────────────────────┘
//!         ▲ add/remove          │ broadcast (snapshot)
//!   connection tasks      telemetry pump, command replies
//! ```
//!
//! Broadcast snapshots membership under a short read lock and delivers
//! without holding it, so `add`/`remove` never wait on a slow client.

// ============================================================================
// Imports
// ============================================================================

use std::io;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::identifiers::ClientId;

use super::Client;

// ============================================================================
// Constants
// ============================================================================

/// Default bound on a single delivery during broadcast.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// ClientRegistry
// ============================================================================

/// Concurrently shared set of open clients.
///
/// Membership changes are strictly insert/remove; a registered [`Client`]
/// is never mutated in place.
///
/// # Idempotence
///
/// - [`add`](Self::add) with an id already present replaces the entry;
///   the size does not change and `false` is returned.
/// - [`remove`](Self::remove) of an absent id is a no-op returning `None`.
#[derive(Debug)]
pub struct ClientRegistry {
    clients: RwLock<FxHashMap<ClientId, Arc<Client>>>,
    write_timeout: Duration,
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// ClientRegistry - Membership
// ============================================================================

impl ClientRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::with_write_timeout(DEFAULT_WRITE_TIMEOUT)
    }

    /// Creates an empty registry with a custom per-delivery timeout.
    #[must_use]
    pub fn with_write_timeout(write_timeout: Duration) -> Self {
        Self {
            clients: RwLock::new(FxHashMap::default()),
            write_timeout,
        }
    }

    /// Registers a client; returns `true` if its id was not present.
    pub fn add(&self, client: Arc<Client>) -> bool {
        let id = client.id();
        let previous = self.clients.write().insert(id, client);
        if previous.is_some() {
            debug!(client_id = %id, "Client re-registered");
        }
        previous.is_none()
    }

    /// Removes a client, returning it if it was registered.
    pub fn remove(&self, id: &ClientId) -> Option<Arc<Client>> {
        let removed = self.clients.write().remove(id);
        if removed.is_some() {
            debug!(client_id = %id, "Client removed from registry");
        }
        removed
    }

    /// Returns the registered client with this id.
    #[must_use]
    pub fn get(&self, id: &ClientId) -> Option<Arc<Client>> {
        self.clients.read().get(id).cloned()
    }

    /// Returns `true` if the id is registered.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &ClientId) -> bool {
        self.clients.read().contains_key(id)
    }

    /// Returns the number of registered clients.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    /// Returns `true` if no client is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }

    /// Copies the current membership.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<Client>> {
        self.clients.read().values().cloned().collect()
    }
}

// ============================================================================
// ClientRegistry - Delivery
// ============================================================================

impl ClientRegistry {
    /// Delivers `message` to every registered client.
    ///
    /// Clients whose delivery fails or exceeds the write timeout are
    /// removed and aborted; the others still receive the message.
    ///
    /// # Returns
    ///
    /// Number of clients the message was delivered to.
    pub async fn broadcast(&self, message: &str) -> usize {
        let clients = self.snapshot();
        if clients.is_empty() {
            return 0;
        }

        let outcomes = join_all(
            clients
                .iter()
                .map(|client| self.deliver(client, message)),
        )
        .await;

        let mut delivered = 0;
        for (client, outcome) in clients.iter().zip(outcomes) {
            match outcome {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(client_id = %client.id(), error = %e, "Broadcast delivery failed");
                    self.evict(client).await;
                }
            }
        }

        delivered
    }

    /// Delivers `message` to one client, removing and aborting it on failure.
    ///
    /// # Errors
    ///
    /// Returns the delivery error after the client has been removed.
    pub async fn send_to(&self, client: &Client, message: &str) -> Result<()> {
        let outcome = self.deliver(client, message).await;
        if let Err(ref e) = outcome {
            warn!(client_id = %client.id(), error = %e, "Delivery failed");
            self.evict(client).await;
        }
        outcome
    }

    /// Delivers `message` to the client registered under `id`.
    ///
    /// # Errors
    ///
    /// - [`Error::ClientNotFound`] if the id is not registered
    /// - the delivery error otherwise (the client is removed)
    pub async fn send_to_id(&self, id: &ClientId, message: &str) -> Result<()> {
        let client = self.get(id).ok_or_else(|| Error::client_not_found(*id))?;
        self.send_to(&client, message).await
    }

    /// Removes every client and closes its connection.
    pub async fn disconnect_all(&self) {
        let clients: Vec<_> = {
            let mut map = self.clients.write();
            map.drain().map(|(_, client)| client).collect()
        };

        let count = clients.len();
        join_all(clients.iter().map(|client| client.close())).await;

        if count > 0 {
            debug!(count, "Disconnected all clients");
        }
    }

    /// A failed write may have left a partial frame on the wire, so the
    /// client is shut down without a close frame.
    async fn evict(&self, client: &Client) {
        self.remove(&client.id());
        client.abort().await;
    }

    async fn deliver(&self, client: &Client, message: &str) -> Result<()> {
        match timeout(self.write_timeout, client.send(message)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                "client write timed out",
            ))),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
