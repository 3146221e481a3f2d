//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher accept slot
//!     → admission.rs (permit per pending accept)
//!     → TcpListener::accept
//!     → connection.rs (ID, in-flight tracking)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Admission permits cover the accept-wait only
//! - Each served connection is tracked for graceful shutdown

pub mod admission;
pub mod connection;

pub use admission::{AdmissionGate, AdmissionPermit, GateClosed};
pub use connection::{ConnectionGuard, ConnectionId, ConnectionState, ConnectionTracker};
