// Logging setup on top of `tracing` / `tracing-subscriber`.
//
// RUST_LOG controls the filter, e.g. `RUST_LOG=bakery_report=debug`.
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. Defaults to `info` when RUST_LOG is unset.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true)
        .init();
}

/// Debug-level subscriber writing through the test harness. Safe to call
/// from every test.
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
