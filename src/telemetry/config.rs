/// Log subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Filter used when `RUST_LOG` is unset, e.g. `mevrebels_indexer=debug,warn`.
    pub log_filter: String,
    /// ANSI colours on console output. Cleared by `NO_COLOR`.
    pub console_colors: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".into(),
            console_colors: true,
        }
    }
}
