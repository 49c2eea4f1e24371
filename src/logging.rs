//! Logging setup

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "model_registry=info";

/// Install the global `tracing` subscriber.
///
/// Honours `RUST_LOG`, falling back to info-level logs for this crate. Safe
/// to call more than once; later calls are ignored.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_err()
    {
        tracing::debug!("Tracing subscriber already installed");
    }
}
