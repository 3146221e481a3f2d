//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger() → dispatcher stops accepting → in-flight requests drain → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger()
//! ```
//!
//! # Design Decisions
//! - One broadcast channel per server; every long-running loop subscribes
//! - Shutdown has a deadline: draining stops after the grace period

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
