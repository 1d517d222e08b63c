use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install a fmt subscriber. `RUST_LOG` overrides the configured level.
/// Returns false when a global subscriber was already set.
pub fn init(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    // captured per test by libtest
    #[cfg(test)]
    let builder = builder.with_test_writer();
    builder.try_init().is_ok()
}
