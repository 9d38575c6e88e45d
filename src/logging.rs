//! Logging setup
//!
//! Structured logging via the `tracing` crate. Library code only emits
//! events; installing a subscriber is the embedding application's call, and
//! this helper covers the common case.

use tracing_subscriber::{fmt, EnvFilter};

/// Install a formatting subscriber filtered by `RUST_LOG`, defaulting to
/// the given directive. Safe to call more than once; later calls are no-ops.
pub fn init(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = fmt().with_env_filter(filter).try_init();
}
