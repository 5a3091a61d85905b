pub mod actor;
pub mod broadcast;
pub mod handler;
pub mod protocol;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Type alias for the sender half of a WebSocket connection's channel.
/// Other parts of the system can clone this to push messages to a specific client.
pub type ConnectionSender = mpsc::UnboundedSender<axum::extract::ws::Message>;

/// Process-unique identifier of one WebSocket connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

impl ConnectionId {
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Connection registry: tracks all active WebSocket connections per user.
/// A user can have multiple concurrent connections (multiple devices/tabs).
///
/// A user key is present iff it has at least one connection. Inserts and
/// removals go through the DashMap entry API, so the shard lock is held
/// while the per-user map is changed and an empty map is never observable.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<DashMap<String, HashMap<ConnectionId, ConnectionSender>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection for a user. Registering the same id again replaces
    /// its sender.
    pub fn register(&self, user_id: &str, connection_id: ConnectionId, sender: ConnectionSender) {
        let count = {
            let mut connections = self.inner.entry(user_id.to_string()).or_default();
            connections.insert(connection_id, sender);
            connections.len()
        };

        tracing::debug!(
            user_id = %user_id,
            connection_id = %connection_id,
            connections = count,
            "Connection registered"
        );
    }

    /// Remove a connection; drops the user entry with its last connection.
    pub fn unregister(&self, user_id: &str, connection_id: ConnectionId) {
        let remaining = match self.inner.entry(user_id.to_string()) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().remove(&connection_id);
                let remaining = entry.get().len();
                if remaining == 0 {
                    entry.remove();
                }
                remaining
            }
            Entry::Vacant(_) => 0,
        };

        tracing::debug!(
            user_id = %user_id,
            connection_id = %connection_id,
            remaining = remaining,
            "Connection unregistered"
        );
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.inner.contains_key(user_id)
    }

    /// Number of distinct online users.
    pub fn online_count(&self) -> usize {
        self.inner.len()
    }

    pub fn connection_count(&self, user_id: &str) -> usize {
        self.inner.get(user_id).map(|c| c.len()).unwrap_or(0)
    }

    /// Snapshot of one user's senders. Cloned so no shard lock is held while sending.
    pub(crate) fn senders_for(&self, user_id: &str) -> Vec<ConnectionSender> {
        self.inner
            .get(user_id)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn all_senders(&self) -> Vec<ConnectionSender> {
        self.inner
            .iter()
            .flat_map(|entry| entry.value().values().cloned().collect::<Vec<_>>())
            .collect()
    }
}
