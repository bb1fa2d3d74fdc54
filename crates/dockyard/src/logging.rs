//! Tracing setup for test suites

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber writing through the test harness capture.
///
/// Filtering follows `RUST_LOG` and defaults to `info`. Safe to call from
/// every test; only the first call installs the subscriber.
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
