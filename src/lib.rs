//! Session-aware HTTP dispatch server library.
//!
//! ```text
//!   accept loop ──permit──▶ accept ──▶ session store ──▶ request task
//!        ▲                     │                             │
//!        └── admission gate ◀──┘ (released on accept)        ▼
//!                                               parse ─▶ route table ─▶ response
//! ```

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod session;

pub use config::ServerConfig;
pub use http::{HttpServer, ResponsePacket, ServerBuilder, ServerError};
pub use lifecycle::Shutdown;
pub use routing::{HandlerError, HandlerResult, RouteTable};
pub use session::{Session, SessionStore};
