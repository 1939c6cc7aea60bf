//! Structured tracing initialization helpers.

use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber, honoring `RUST_LOG` when set and
/// falling back to `default_level` otherwise.
///
/// # Errors
///
/// Returns an error if a global subscriber has already been installed.
pub fn init(default_level: &str) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to install tracing subscriber: {err}"))
}
