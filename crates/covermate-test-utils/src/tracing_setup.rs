//! Tracing for tests.
//!
//! Events go to the test-harness writer, so they only show up for failing
//! tests or under `--nocapture`. Only the first initialisation in a process
//! takes effect; later calls are no-ops.

use tracing_subscriber::EnvFilter;

/// Capture covermate events at `debug` unless `RUST_LOG` says otherwise.
///
/// ```ignore
/// #[tokio::test]
/// async fn runs_report() {
///     covermate_test_utils::tracing_setup::init_test_tracing();
///     // ...
/// }
/// ```
pub fn init_test_tracing() {
    init_test_tracing_with("covermate_core=debug,covermate_config=debug,info");
}

/// Like [`init_test_tracing`] with an explicit fallback filter directive.
pub fn init_test_tracing_with(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_test_writer()
        .try_init();
}
