pub mod builders;
pub mod fake_executor;
pub mod workers;

use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};
use workchain::logging::{log_directive, LOG_ENV};

static INIT: Once = Once::new();

/// How long a single async scenario may take before the test fails.
pub const SCENARIO_TIMEOUT: Duration = Duration::from_secs(5);

/// Install a capturing subscriber once per test binary.
///
/// Reads the same `WORKCHAIN_LOG` directive as the binary, so
/// `WORKCHAIN_LOG=workchain::engine=debug cargo test -- --nocapture` shows
/// scheduler decisions for a failing scenario.
pub fn init_tracing() {
    INIT.call_once(|| {
        let env = std::env::var(LOG_ENV).ok();
        let filter = EnvFilter::try_new(log_directive(None, env.as_deref()))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Await `f`, failing the test if it outlives [`SCENARIO_TIMEOUT`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(SCENARIO_TIMEOUT, f)
        .await
        .unwrap_or_else(|_| panic!("scenario did not finish within {SCENARIO_TIMEOUT:?}"))
}
