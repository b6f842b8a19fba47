//! Logging init: human-readable events on stderr, filtered by `RUST_LOG`.

use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `info` is used, or `debug` when `verbose` is set.
/// Fails when a global subscriber is already installed.
pub fn init_logging(verbose: bool) -> Result<()> {
    let default_directive = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("failed to initialise logging: {err}"))
}
