//! Structured logging initialization (§10.2 ambient stack).
//!
//! Controlled by `RUST_LOG` (the standard `tracing-subscriber` env var),
//! defaulting to `"info"` when unset or invalid.

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber. Call once from `main`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
