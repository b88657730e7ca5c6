/// Initialize tracing for tests with appropriate settings
#[inline]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer() // Write to test output
        .try_init();
}

/// Install the test subscriber once per test binary.
#[macro_export]
macro_rules! init_test_tracing {
    () => {
        $crate::test_utils::init_tracing()
    };
}
