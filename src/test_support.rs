//! Test-only helpers shared across module test suites.

use std::sync::Once;

static LOGGER_INIT: Once = Once::new();

/// Routes `log` records to stderr for the duration of the test binary, so
/// `cargo test -- --nocapture` shows recovery/rollover activity. Safe to call
/// from every test; initializes at most once per process.
pub(crate) fn init_test_logger() {
    LOGGER_INIT.call_once(|| {
        let _ = simplelog::TermLogger::init(
            simplelog::LevelFilter::Debug,
            simplelog::Config::default(),
            simplelog::TerminalMode::Stderr,
            simplelog::ColorChoice::Never,
        );
    });
}
