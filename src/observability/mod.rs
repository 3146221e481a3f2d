//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout via tracing-subscriber
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Each request runs in a `request` span carrying its request ID
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
