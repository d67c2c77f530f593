//! Ingestion coordinator: the single idempotent consumer both producers feed.
//!
//! Push and poll may deliver the same transaction at the same time. The
//! coordinator keeps no per-transaction state and does not deduplicate; the
//! store's conflict rules are the only serialization point.

use crate::core::extractor::LogExtractor;
use crate::core::handlers::HandlerRegistry;
use crate::core::metrics::{IngestionMetrics, MetricsSnapshot};
use crate::storage::PersistenceGateway;
use crate::types::records::WriteOutcome;
use crate::types::transaction::TransactionEnvelope;
use crate::utils::error::{IndexerError, Result};
use crate::utils::logging;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// What happened to one transaction's events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransactionReport {
    /// Events decoded from the logs.
    pub decoded: usize,
    /// Rows inserted or updated.
    pub written: usize,
    /// Events whose natural key already existed.
    pub duplicates: usize,
    /// Events with no registered handler.
    pub dropped: usize,
    /// Events whose write failed.
    pub failed: usize,
    /// Payloads skipped before decoding completed.
    pub rejected: usize,
}

/// Outcome of a push batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub transactions_received: usize,
    pub transactions_processed: usize,
    pub events_indexed: usize,
    pub failed_transactions: usize,
}

/// Routes extracted events to their persistence action.
///
/// Cheap to share: wrap in an `Arc` and hand clones to every producer.
pub struct IngestionCoordinator {
    extractor: LogExtractor,
    handlers: HandlerRegistry,
    store: Arc<dyn PersistenceGateway>,
    metrics: Arc<IngestionMetrics>,
}

impl IngestionCoordinator {
    /// Coordinator with the default handler for every known kind.
    #[must_use]
    pub fn new(extractor: LogExtractor, store: Arc<dyn PersistenceGateway>) -> Self {
        Self::with_handlers(extractor, HandlerRegistry::with_defaults(), store)
    }

    #[must_use]
    pub fn with_handlers(
        extractor: LogExtractor,
        handlers: HandlerRegistry,
        store: Arc<dyn PersistenceGateway>,
    ) -> Self {
        Self {
            extractor,
            handlers,
            store,
            metrics: Arc::new(IngestionMetrics::new()),
        }
    }

    #[must_use]
    pub fn metrics(&self) -> &Arc<IngestionMetrics> {
        &self.metrics
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Processes one transaction and returns the number of rows inserted or
    /// updated. Replaying the same transaction never creates extra rows.
    ///
    /// # Errors
    ///
    /// Returns `IndexerError::StoreUnavailable` when the store could not be
    /// reached for at least one event. Every event is still attempted first.
    pub async fn process_transaction(&self, tx: &TransactionEnvelope) -> Result<usize> {
        Ok(self.process_transaction_report(tx).await?.written)
    }

    /// Like [`Self::process_transaction`], with the per-event breakdown.
    ///
    /// # Errors
    ///
    /// Returns `IndexerError::StoreUnavailable` when the store could not be
    /// reached for at least one event.
    pub async fn process_transaction_report(
        &self,
        tx: &TransactionEnvelope,
    ) -> Result<TransactionReport> {
        self.metrics.inc_transactions();

        let extraction = self.extractor.extract(tx);
        let mut report = TransactionReport {
            rejected: extraction.rejected,
            ..TransactionReport::default()
        };
        self.metrics.add_rejected(extraction.rejected);

        let mut unavailable: Option<IndexerError> = None;

        for event in &extraction.events {
            let kind = event.event.kind();
            report.decoded += 1;
            self.metrics.inc_decoded();

            let Some(handler) = self.handlers.get(kind) else {
                tracing::warn!(
                    signature = %event.signature,
                    kind = %kind,
                    "No handler registered, dropping event"
                );
                report.dropped += 1;
                self.metrics.inc_unknown_kinds();
                continue;
            };

            match handler.handle(event, self.store.as_ref()).await {
                Ok(WriteOutcome::Written(id)) => {
                    report.written += 1;
                    self.metrics.inc_written();
                    tracing::debug!(signature = %event.signature, kind = %kind, row_id = id, "Event persisted");
                }
                Ok(WriteOutcome::AlreadyExists) => {
                    report.duplicates += 1;
                    self.metrics.inc_duplicates();
                    tracing::debug!(signature = %event.signature, kind = %kind, "Event already exists");
                }
                Ok(WriteOutcome::Acknowledged) => {}
                Err(e) => {
                    report.failed += 1;
                    self.metrics.inc_persistence_failures();
                    tracing::error!(
                        signature = %event.signature,
                        kind = %kind,
                        slot = event.slot,
                        error = %e,
                        "Failed to persist event"
                    );
                    if unavailable.is_none() && e.is_store_unavailable() {
                        unavailable = Some(e);
                    }
                }
            }
        }

        if let Some(e) = unavailable {
            return Err(IndexerError::StoreUnavailable(format!(
                "{e} (transaction {})",
                tx.signature
            )));
        }

        logging::log_transaction(&tx.signature, tx.slot, report.written);
        Ok(report)
    }

    /// Push entry point: processes each transaction independently.
    ///
    /// One transaction's failure never aborts the rest of the batch.
    pub async fn process_batch(&self, transactions: &[TransactionEnvelope]) -> BatchSummary {
        let started = Instant::now();
        let mut summary = BatchSummary {
            transactions_received: transactions.len(),
            ..BatchSummary::default()
        };

        for tx in transactions {
            match self.process_transaction(tx).await {
                Ok(written) => {
                    summary.transactions_processed += 1;
                    summary.events_indexed += written;
                }
                Err(e) => {
                    summary.failed_transactions += 1;
                    tracing::error!(signature = %tx.signature, error = %e, "Failed to process pushed transaction");
                }
            }
        }

        logging::log_batch(
            summary.transactions_processed,
            summary.transactions_received,
            u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        );
        summary
    }
}

impl std::fmt::Debug for IngestionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionCoordinator")
            .field("handlers", &self.handlers)
            .field("metrics", &self.metrics.snapshot())
            .finish_non_exhaustive()
    }
}
