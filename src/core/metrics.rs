//! Ingestion counters.
//!
//! The coordinator's only state between calls. Counters are monotonic and
//! updated with relaxed ordering; a snapshot is a best-effort view.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Running totals for the ingestion pipeline.
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Transactions handed to the coordinator, from either source.
    pub transactions: AtomicU64,
    /// Events successfully decoded.
    pub events_decoded: AtomicU64,
    /// Rows inserted or updated.
    pub rows_written: AtomicU64,
    /// Writes that found their natural key already present.
    pub duplicates: AtomicU64,
    /// Events dropped because no handler is registered for their kind.
    pub unknown_kinds: AtomicU64,
    /// Event writes that failed.
    pub persistence_failures: AtomicU64,
    /// Payloads skipped for bad base64 or a malformed body.
    pub payloads_rejected: AtomicU64,
}

/// Point-in-time copy of [`IngestionMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub transactions: u64,
    pub events_decoded: u64,
    pub rows_written: u64,
    pub duplicates: u64,
    pub unknown_kinds: u64,
    pub persistence_failures: u64,
    pub payloads_rejected: u64,
}

impl IngestionMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_transactions(&self) {
        self.transactions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_decoded(&self) {
        self.events_decoded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_written(&self) {
        self.rows_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_duplicates(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_unknown_kinds(&self) {
        self.unknown_kinds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_persistence_failures(&self) {
        self.persistence_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_rejected(&self, count: usize) {
        self.payloads_rejected
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            transactions: self.transactions.load(Ordering::Relaxed),
            events_decoded: self.events_decoded.load(Ordering::Relaxed),
            rows_written: self.rows_written.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            unknown_kinds: self.unknown_kinds.load(Ordering::Relaxed),
            persistence_failures: self.persistence_failures.load(Ordering::Relaxed),
            payloads_rejected: self.payloads_rejected.load(Ordering::Relaxed),
        }
    }

    /// Reports current metrics to logs.
    pub fn report(&self) {
        let s = self.snapshot();
        tracing::info!(
            transactions = s.transactions,
            events_decoded = s.events_decoded,
            rows_written = s.rows_written,
            duplicates = s.duplicates,
            unknown_kinds = s.unknown_kinds,
            persistence_failures = s.persistence_failures,
            payloads_rejected = s.payloads_rejected,
            "Ingestion stats"
        );
    }
}
