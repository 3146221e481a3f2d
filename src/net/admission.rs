//! Admission gate bounding concurrent accept-waits.
//!
//! # Responsibilities
//! - Hand out at most `capacity` permits at once
//! - Suspend callers until a permit is free
//! - Release a permit when its guard is dropped
//!
//! # Design Decisions
//! - Backed by a Tokio semaphore; permits are owned so they can move into
//!   accept tasks
//! - The dispatcher releases a permit as soon as a connection is accepted,
//!   so the gate bounds pending accepts, not requests being processed

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Returned by [`AdmissionGate::acquire`] once the gate has been closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("admission gate closed")]
pub struct GateClosed;

/// Counting gate over accept-wait operations.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl AdmissionGate {
    /// Create a gate with `capacity` permits.
    pub fn new(capacity: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a permit.
    pub async fn acquire(&self) -> Result<AdmissionPermit, GateClosed> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| GateClosed)?;
        Ok(AdmissionPermit { _permit: permit })
    }

    /// Take a permit only if one is free right now.
    pub fn try_acquire(&self) -> Option<AdmissionPermit> {
        self.permits
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| AdmissionPermit { _permit: permit })
    }

    /// Permits not currently held.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Configured number of permits.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Close the gate. Pending and future `acquire` calls fail with [`GateClosed`].
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }
}

/// A held admission slot. Dropping it returns the slot to the gate.
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionPermit {
    /// Return the slot to the gate.
    pub fn release(self) {}
}
