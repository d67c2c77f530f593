//! `mevrebels-indexer` - event ingestion for the MEVrebels on-chain programs.
//!
//! Programs announce state changes by writing `Program data: <base64>` lines
//! to their transaction logs. This crate turns those lines into typed events
//! and persists them idempotently, whether the transaction arrived by webhook
//! push or by RPC polling.
//!
//! # Quick Start
//!
//! ```no_run
//! use mevrebels_indexer::{
//!     EventDecoder, IngestionCoordinator, LogExtractor, MemoryStore, MonitoredPrograms,
//!     ProgramRole, TransactionEnvelope,
//! };
//! use solana_sdk::pubkey::Pubkey;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Pubkey::new_unique();
//!     let programs = MonitoredPrograms::new(vec![(registry, ProgramRole::StrategyRegistry)])?;
//!
//!     let extractor = LogExtractor::new(EventDecoder::new(programs));
//!     let coordinator = IngestionCoordinator::new(extractor, Arc::new(MemoryStore::new()));
//!
//!     let tx = TransactionEnvelope::with_logs(
//!         "5h6x...",
//!         1,
//!         vec![
//!             format!("Program {registry} invoke [1]"),
//!             "Program data: ...".to_string(),
//!             format!("Program {registry} success"),
//!         ],
//!     );
//!     let rows = coordinator.process_transaction(&tx).await?;
//!     println!("{rows} rows written");
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! 1. **`EventDecoder`** - Maps an 8-byte discriminator to an event layout and
//!    decodes the little-endian payload, gated by the emitting program's role
//! 2. **`LogExtractor`** - Finds `Program data:` lines and attributes each to
//!    the program on top of the invoke stack
//! 3. **`IngestionCoordinator`** - Routes decoded events to their handler and
//!    isolates failures per event
//! 4. **`PersistenceGateway`** - Conflict-aware writes; replaying a
//!    transaction never creates extra rows
//! 5. **`Poller`** / **webhook** - The two producers feeding the coordinator

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

// Public API exports
pub use config::{
    BackoffConfig, CommitmentLevel, IndexerConfig, IndexerConfigBuilder, MonitoredProgram,
    MonitoredPrograms, PollerConfig, WebhookConfig,
};
pub use core::coordinator::{BatchSummary, IngestionCoordinator, TransactionReport};
pub use core::decoder::EventDecoder;
pub use core::extractor::{Extraction, LogExtractor};
pub use core::handlers::{EventHandler, HandlerRegistry};
pub use core::metrics::{IngestionMetrics, MetricsSnapshot};
pub use storage::{CursorStore, MemoryStore, PersistenceGateway, Storage};
pub use streams::poller::{CycleReport, Poller, PollerHandle, PollerState};
pub use streams::webhook::{WebhookState, router as webhook_router};
pub use types::events::{
    DecodedEvent, EventKind, ProfitDistributed, ProgramRole,
    ProposalCreated, StrategyCreated, StrategyExecuted, VoteCast, VoteDirection,
    calculate_discriminator,
};
pub use types::records::{
    ExecutionRecord, ProposalRecord, ProposalStatus, RowId, StrategyRecord, StrategyStatus,
    VoteRecord, WriteOutcome,
};
pub use types::transaction::{EnrichedEvent, SignatureInfo, TransactionEnvelope, TransactionMeta};
pub use utils::error::{DecodeError, DecodeFailure, IndexerError, Result};
pub use utils::rpc::{DefaultRpcProvider, RpcProvider};

// Module declarations
pub mod config;
pub mod core;
pub mod storage;
pub mod streams;
pub mod types;
pub mod utils;

#[cfg(feature = "telemetry")]
pub mod telemetry;
