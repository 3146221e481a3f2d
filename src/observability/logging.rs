//! Structured logging.
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - `RUST_LOG` overrides the configured level

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the filter used when `RUST_LOG` is not set.
pub fn default_filter(level: &str) -> String {
    format!("dispatch_server={level},tower_http={level}")
}

/// Install the global tracing subscriber.
///
/// Returns `false` if a subscriber was already installed.
pub fn init(level: &str) -> bool {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(level).into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
