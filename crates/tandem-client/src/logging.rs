//! Tracing setup for harness binaries and tests.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "info,tandem_client=info,tandem_core=info";

/// Install a fmt subscriber filtered by `RUST_LOG`, or `info` when unset.
///
/// Returns `false` if a global subscriber was already installed, so tests
/// and drivers can call it unconditionally.
pub fn init() -> bool {
    init_with(DEFAULT_FILTER)
}

/// Like [`init`], with `default_filter` used when `RUST_LOG` is unset.
pub fn init_with(default_filter: &str) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(env_filter)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_with("debug");
        assert!(!init());
    }
}
