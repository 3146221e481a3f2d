//! Concurrent session table keyed by client identity.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::observability::metrics;
use crate::session::record::{ClientIdentity, Session};

/// Thread-safe table of client sessions.
///
/// Cloning shares the same table.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<DashMap<ClientIdentity, Arc<Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the session for `identity`, creating it on first contact.
    ///
    /// Insert-if-absent is atomic per identity. Lookup alone does not
    /// refresh the activity instant.
    pub fn get_or_create(&self, identity: ClientIdentity) -> Arc<Session> {
        let (session, created) = match self.sessions.entry(identity) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => {
                let session = Arc::new(Session::new(identity));
                entry.insert(Arc::clone(&session));
                (session, true)
            }
        };

        if created {
            let total = self.sessions.len();
            tracing::debug!(client = %identity, sessions = total, "Session created");
            metrics::record_sessions(total);
        }
        session
    }

    pub fn get(&self, identity: &ClientIdentity) -> Option<Arc<Session>> {
        self.sessions.get(identity).map(|entry| Arc::clone(entry.value()))
    }

    /// Record activity on `session`.
    pub fn touch(&self, session: &Session) {
        session.refresh();
    }

    pub fn is_expired(&self, session: &Session, threshold: Duration) -> bool {
        session.is_expired(threshold)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Forget every session.
    pub fn reset(&self) {
        self.sessions.clear();
        metrics::record_sessions(0);
    }
}
