//! Session subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted connection (remote IP)
//!     → store.rs (get_or_create, atomic per identity)
//!     → Arc<Session> handed to the request task
//!     → routing checks expiry lazily for auth-gated routes
//!     → dispatcher touches the session after routing
//! ```
//!
//! # Design Decisions
//! - Keyed on the client IP; the ephemeral port is ignored
//! - Sessions are never evicted; expiry is evaluated on demand
//! - No background sweep

pub mod record;
pub mod store;

pub use record::{ClientIdentity, Session};
pub use store::SessionStore;
