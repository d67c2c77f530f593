//! Backoff for failing poll cycles.
//!
//! This module provides:
//! - [`compute_backoff`]: exponential-backoff delay calculator with optional jitter.
//! - [`is_transient`]: classifies an [`IndexerError`] as a source hiccup or not.
//! - [`FailureBackoff`]: consecutive-failure tracker driving the poll loop's sleep.

use crate::config::BackoffConfig;
use crate::utils::error::IndexerError;
use std::time::Duration;

// ─────────────────────────────────────────────────────────────────────────────
// Backoff calculation
// ─────────────────────────────────────────────────────────────────────────────

/// Computes the delay after `attempt` consecutive failures.
///
/// `attempt` is 1-indexed. `attempt = 0` means no failure and yields the
/// initial delay without jitter.
///
/// Formula: `delay = initial_backoff_ms * backoff_multiplier^(attempt - 1)`,
/// capped at `max_backoff_ms`, then ±25 % jitter if enabled.
#[must_use]
pub fn compute_backoff(cfg: &BackoffConfig, attempt: u32) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(cfg.initial_backoff_ms);
    }
    let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
    let base = cfg.initial_backoff_ms as f64 * cfg.backoff_multiplier.powi(exponent);
    let capped = base.min(cfg.max_backoff_ms as f64);

    let ms = if cfg.jitter {
        // jitter factor in [0.75, 1.25], seeded from the clock
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos();
        let factor = 0.75 + f64::from(nanos % 1_000_000) / 1_000_000.0 * 0.5;
        (capped * factor).min(cfg.max_backoff_ms as f64)
    } else {
        capped
    };

    Duration::from_millis(ms as u64)
}

// ─────────────────────────────────────────────────────────────────────────────
// Error classification
// ─────────────────────────────────────────────────────────────────────────────

/// Returns `true` if `err` is a source or store hiccup that the next cycle
/// may not hit again.
///
/// | Error variant       | Transient | Reason                                 |
/// |---------------------|-----------|----------------------------------------|
/// | `RpcError`          | ✅        | Network blip or HTTP 429 / 503         |
/// | `RpcClientError`    | ✅        | Low-level `ClientError`                |
/// | `StoreUnavailable`  | ✅        | Pool timeout, connection refused       |
/// | `DatabaseError`     | only I/O  | Constraint violations are stable       |
/// | `DataError`         | ❌        | Bad data will not self-heal            |
/// | `ConfigError`       | ❌        | Programmer error                       |
#[must_use]
pub fn is_transient(err: &IndexerError) -> bool {
    matches!(
        err,
        IndexerError::RpcError(_) | IndexerError::RpcClientError(_)
    ) || err.is_store_unavailable()
}

// ─────────────────────────────────────────────────────────────────────────────
// FailureBackoff
// ─────────────────────────────────────────────────────────────────────────────

/// Tracks consecutive failed cycles. Resets on the first success.
#[derive(Debug, Clone)]
pub struct FailureBackoff {
    config: BackoffConfig,
    consecutive_failures: u32,
}

impl FailureBackoff {
    #[must_use]
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            consecutive_failures: 0,
        }
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Delay before the next cycle.
    #[must_use]
    pub fn next_delay(&self) -> Duration {
        compute_backoff(&self.config, self.consecutive_failures)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
