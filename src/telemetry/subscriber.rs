use super::config::TelemetryConfig;
use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Keeps the subscriber installed for the life of the process.
#[must_use = "dropping the guard early ends telemetry for the process"]
pub struct TelemetryGuard {
    _private: (),
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        shutdown_telemetry();
    }
}

static TELEMETRY_INIT: OnceLock<()> = OnceLock::new();

/// Installs the global tracing subscriber once.
///
/// `RUST_LOG` wins over `config.log_filter`. Later calls are no-ops, and a
/// subscriber installed elsewhere (e.g. by a test harness) is left in place.
pub fn init_telemetry(config: TelemetryConfig) -> TelemetryGuard {
    TELEMETRY_INIT.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));

        let fmt_layer = fmt::layer().with_ansi(config.console_colors);

        let installed = tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .is_ok();

        if installed {
            tracing::debug!(filter = %config.log_filter, "Telemetry initialised");
        }
    });

    TelemetryGuard { _private: () }
}

/// Flushes buffered output before exit.
pub fn shutdown_telemetry() {
    use std::io::Write;
    let _ = std::io::stdout().flush();
}
