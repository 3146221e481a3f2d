//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Parsed request (verb, path, params) + Session
//!     → router.rs (first matching route)
//!     → matcher.rs (verb + exact/prefix path)
//!     → auth gate (expired session, missing principal)
//!     → handler → ResponsePacket
//!
//! Registration (at startup):
//!     add_route(...) in order
//!     → frozen into the server state
//! ```
//!
//! # Design Decisions
//! - Routes registered at startup, immutable at runtime
//! - No regex in hot path (exact and prefix matching only)
//! - Deterministic: same input always matches same route
//! - First match wins (registration order)

pub mod files;
pub mod matcher;
pub mod router;

pub use files::static_files;
pub use matcher::{PathPattern, RouteMatcher};
pub use router::{BoxedHandler, DispatchError, HandlerError, HandlerResult, Route, RouteTable};
