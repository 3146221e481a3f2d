//! Connection identity and in-flight tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Name the stages a connection moves through
//! - Count connections still being served so shutdown can drain them

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Global atomic counter for connection IDs.
/// Relaxed ordering is sufficient since only uniqueness is needed.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Stages of a single connection.
///
/// ```text
/// Accepted → SessionResolved → Parsed → Routed → Responded
///                                 └────────┴──────→ Responded (ServerError)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Accepted,
    SessionResolved,
    Parsed,
    Routed,
    Responded,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Accepted => "accepted",
            ConnectionState::SessionResolved => "session_resolved",
            ConnectionState::Parsed => "parsed",
            ConnectionState::Routed => "routed",
            ConnectionState::Responded => "responded",
        };
        f.write_str(name)
    }
}

/// Tracks connections that are still being served.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    active_count: Arc<AtomicU64>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new active connection. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            id: ConnectionId::new(),
        }
    }

    /// Get current active connection count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Wait until every tracked connection has finished, or `grace` elapses.
    ///
    /// Returns `true` when the tracker drained in time.
    pub async fn wait_idle(&self, grace: Duration) -> bool {
        let drained = async {
            while self.active_count.load(Ordering::SeqCst) > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        tokio::time::timeout(grace, drained).await.is_ok()
    }
}

/// Guard that tracks a connection's lifetime.
/// Decrements the active count when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    id: ConnectionId,
}

impl ConnectionGuard {
    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}
