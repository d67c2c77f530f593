//! Structured logging setup.
//!
//! Only compiled with the `telemetry` feature. The library itself only emits
//! `tracing` events; installing a subscriber is left to the binary.

/// Subscriber configuration.
pub mod config;

/// Global subscriber initialisation and shutdown.
pub mod subscriber;

pub use config::TelemetryConfig;
pub use subscriber::{TelemetryGuard, init_telemetry, shutdown_telemetry};
