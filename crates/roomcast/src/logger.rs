//! Logging setup.

use tracing_subscriber::EnvFilter;

/// Installs a global `tracing` subscriber that writes to stdout.
///
/// The filter comes from `RUST_LOG` when it is set, otherwise from
/// `default_level` (for example `"info"` or `"roomcast=debug"`). Calling
/// this more than once is harmless; only the first call installs.
pub fn setup_logger(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_logger_twice_does_not_panic() {
        setup_logger("info");
        setup_logger("debug");
        tracing::info!("logger installed");
    }
}
