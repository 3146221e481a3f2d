//! A single client's server-side state.

use dashmap::DashMap;
use serde_json::Value;
use std::net::IpAddr;
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

/// Network identity a session is keyed on.
pub type ClientIdentity = IpAddr;

/// Server-side state for one client.
///
/// Sessions are handed out as `Arc<Session>` by the
/// [`SessionStore`](super::SessionStore); only the store refreshes the
/// activity instant.
#[derive(Debug)]
pub struct Session {
    identity: ClientIdentity,
    created_at: Instant,
    last_activity: Mutex<Instant>,
    principal: RwLock<Option<String>>,
    values: DashMap<String, Value>,
}

impl Session {
    pub(crate) fn new(identity: ClientIdentity) -> Self {
        let now = Instant::now();
        Self {
            identity,
            created_at: now,
            last_activity: Mutex::new(now),
            principal: RwLock::new(None),
            values: DashMap::new(),
        }
    }

    pub fn identity(&self) -> ClientIdentity {
        self.identity
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn last_activity(&self) -> Instant {
        *self.last_activity.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Time since the last recorded activity.
    pub fn idle_for(&self) -> Duration {
        Instant::now().saturating_duration_since(self.last_activity())
    }

    /// True when the session has been idle for longer than `threshold`.
    pub fn is_expired(&self, threshold: Duration) -> bool {
        self.is_expired_at(Instant::now(), threshold)
    }

    /// Expiration check against an explicit clock reading.
    pub fn is_expired_at(&self, now: Instant, threshold: Duration) -> bool {
        now.saturating_duration_since(self.last_activity()) > threshold
    }

    pub(crate) fn refresh(&self) {
        *self.last_activity.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    #[cfg(test)]
    pub(crate) fn backdate(&self, by: Duration) {
        let mut last = self.last_activity.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(earlier) = last.checked_sub(by) {
            *last = earlier;
        }
    }

    /// The authenticated principal, if a handler signed one in.
    pub fn principal(&self) -> Option<String> {
        self.principal.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Attach a principal, replacing any previous one.
    pub fn sign_in(&self, principal: impl Into<String>) {
        *self.principal.write().unwrap_or_else(|e| e.into_inner()) = Some(principal.into());
    }

    pub fn sign_out(&self) {
        *self.principal.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Read a session-scoped value.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).map(|entry| entry.value().clone())
    }

    /// Store a session-scoped value, returning the previous one.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(key.into(), value.into())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.values.remove(key).map(|(_, value)| value)
    }

    /// Number of session-scoped values.
    pub fn value_count(&self) -> usize {
        self.values.len()
    }
}
