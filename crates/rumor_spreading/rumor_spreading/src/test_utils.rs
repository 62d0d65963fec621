//! Helpers for driving whole networks in tests.

mod sim;

pub use sim::*;

/// Install a fmt subscriber writing through the test harness. Filtering is
/// off unless `RUST_LOG` says otherwise. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
