//! Event handlers and the registry the coordinator dispatches through.
//!
//! Dispatch is a pure mapping from [`EventKind`] to one persistence action.
//! Handlers hold no state; everything they need arrives with the event.

use crate::storage::PersistenceGateway;
use crate::types::events::{DecodedEvent, EventKind};
use crate::types::records::{
    ExecutionRecord, ProposalRecord, StrategyRecord, VoteRecord, WriteOutcome,
};
use crate::types::transaction::EnrichedEvent;
use crate::utils::error::{IndexerError, Result};
use async_trait::async_trait;
use std::collections::HashMap;

/// Persists one kind of event.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// The event kind this handler processes.
    fn kind(&self) -> EventKind;

    /// Applies the event to the store.
    ///
    /// # Errors
    ///
    /// Propagates gateway failures, and `DataError` for values the store
    /// cannot represent.
    async fn handle(
        &self,
        event: &EnrichedEvent,
        store: &dyn PersistenceGateway,
    ) -> Result<WriteOutcome>;
}

fn mismatch(expected: EventKind, event: &EnrichedEvent) -> IndexerError {
    IndexerError::InternalError(format!(
        "{expected} handler received {} in {}",
        event.event.kind(),
        event.signature
    ))
}

/// `StrategyCreated` → insert-or-update on `(creator, strategy_id)`.
pub struct StrategyUpsert;

#[async_trait]
impl EventHandler for StrategyUpsert {
    fn kind(&self) -> EventKind {
        EventKind::StrategyCreated
    }

    async fn handle(
        &self,
        event: &EnrichedEvent,
        store: &dyn PersistenceGateway,
    ) -> Result<WriteOutcome> {
        let DecodedEvent::StrategyCreated(created) = &event.event else {
            return Err(mismatch(self.kind(), event));
        };
        let id = store
            .upsert_strategy(&StrategyRecord::from_event(created, event)?)
            .await?;
        Ok(WriteOutcome::Written(id))
    }
}

/// `StrategyExecuted` → insert-or-ignore on `signature`.
pub struct ExecutionInsert;

#[async_trait]
impl EventHandler for ExecutionInsert {
    fn kind(&self) -> EventKind {
        EventKind::StrategyExecuted
    }

    async fn handle(
        &self,
        event: &EnrichedEvent,
        store: &dyn PersistenceGateway,
    ) -> Result<WriteOutcome> {
        let DecodedEvent::StrategyExecuted(executed) = &event.event else {
            return Err(mismatch(self.kind(), event));
        };
        let id = store
            .insert_execution_if_absent(&ExecutionRecord::from_event(executed, event)?)
            .await?;
        Ok(id.map_or(WriteOutcome::AlreadyExists, WriteOutcome::Written))
    }
}

/// `ProposalCreated` → insert-or-update on `(proposer, proposal_id)`.
pub struct ProposalUpsert;

#[async_trait]
impl EventHandler for ProposalUpsert {
    fn kind(&self) -> EventKind {
        EventKind::ProposalCreated
    }

    async fn handle(
        &self,
        event: &EnrichedEvent,
        store: &dyn PersistenceGateway,
    ) -> Result<WriteOutcome> {
        let DecodedEvent::ProposalCreated(created) = &event.event else {
            return Err(mismatch(self.kind(), event));
        };
        let id = store
            .upsert_proposal(&ProposalRecord::from_event(created, event)?)
            .await?;
        Ok(WriteOutcome::Written(id))
    }
}

/// `VoteCast` → insert-or-ignore on `signature`.
pub struct VoteInsert;

#[async_trait]
impl EventHandler for VoteInsert {
    fn kind(&self) -> EventKind {
        EventKind::VoteCast
    }

    async fn handle(
        &self,
        event: &EnrichedEvent,
        store: &dyn PersistenceGateway,
    ) -> Result<WriteOutcome> {
        let DecodedEvent::VoteCast(vote) = &event.event else {
            return Err(mismatch(self.kind(), event));
        };
        let id = store
            .insert_vote_if_absent(&VoteRecord::from_event(vote, event)?)
            .await?;
        Ok(id.map_or(WriteOutcome::AlreadyExists, WriteOutcome::Written))
    }
}

/// `ProfitDistributed` has no table of its own; creator earnings and executor
/// stats are aggregated from executions by the reporting layer.
pub struct DistributionLog;

#[async_trait]
impl EventHandler for DistributionLog {
    fn kind(&self) -> EventKind {
        EventKind::ProfitDistributed
    }

    async fn handle(
        &self,
        event: &EnrichedEvent,
        _store: &dyn PersistenceGateway,
    ) -> Result<WriteOutcome> {
        let DecodedEvent::ProfitDistributed(split) = &event.event else {
            return Err(mismatch(self.kind(), event));
        };
        tracing::info!(
            signature = %event.signature,
            strategy = %split.strategy,
            creator_share = split.creator_share,
            executor_share = split.executor_share,
            treasury_share = split.treasury_share,
            "Profit distributed"
        );
        Ok(WriteOutcome::Acknowledged)
    }
}

/// Handler registry keyed by event kind.
///
/// # Example
///
/// ```
/// use mevrebels_indexer::{EventKind, HandlerRegistry};
///
/// let registry = HandlerRegistry::with_defaults();
/// assert_eq!(registry.len(), 5);
/// assert!(registry.get(EventKind::VoteCast).is_some());
/// ```
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<EventKind, Box<dyn EventHandler>>,
}

impl HandlerRegistry {
    /// Creates a new empty handler registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the standard persistence action for every known kind.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(StrategyUpsert));
        registry.register(Box::new(ExecutionInsert));
        registry.register(Box::new(ProposalUpsert));
        registry.register(Box::new(VoteInsert));
        registry.register(Box::new(DistributionLog));
        registry
    }

    /// Registers `handler` for its kind, replacing any previous one.
    pub fn register(&mut self, handler: Box<dyn EventHandler>) {
        self.handlers.insert(handler.kind(), handler);
    }

    #[must_use]
    pub fn get(&self, kind: EventKind) -> Option<&dyn EventHandler> {
        self.handlers.get(&kind).map(AsRef::as_ref)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("kinds", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
