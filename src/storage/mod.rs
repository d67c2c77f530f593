//! Persistence gateway and cursor storage.
//!
//! The gateway's uniqueness contract is what makes dual-source ingestion safe:
//! every write is a single `INSERT ... ON CONFLICT` statement keyed by the
//! record's natural key, so concurrent or repeated deliveries converge on one
//! row inside the store.

pub mod memory;

pub use memory::MemoryStore;

use crate::types::records::{ExecutionRecord, ProposalRecord, RowId, StrategyRecord, VoteRecord};
use crate::utils::error::Result;
use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Idempotent writes for decoded events.
///
/// Implementations must apply each operation atomically per row:
///
/// | Operation                    | Natural key                 | On conflict                         |
/// |------------------------------|-----------------------------|-------------------------------------|
/// | `upsert_strategy`            | `(creator, strategy_id)`    | update `name`, `status`             |
/// | `insert_execution_if_absent` | `signature`                 | no-op, returns `None`               |
/// | `upsert_proposal`            | `(proposer, proposal_id)`   | update `status`, `yes_votes`, `no_votes` |
/// | `insert_vote_if_absent`      | `signature`                 | no-op, returns `None`               |
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn upsert_strategy(&self, record: &StrategyRecord) -> Result<RowId>;
    async fn insert_execution_if_absent(&self, record: &ExecutionRecord) -> Result<Option<RowId>>;
    async fn upsert_proposal(&self, record: &ProposalRecord) -> Result<RowId>;
    async fn insert_vote_if_absent(&self, record: &VoteRecord) -> Result<Option<RowId>>;
}

/// Durable per-program polling watermarks.
#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn load_cursor(&self, program_id: &Pubkey) -> Result<Option<String>>;
    async fn save_cursor(&self, program_id: &Pubkey, signature: &str) -> Result<()>;
}

/// `PostgreSQL`-backed storage.
///
/// # Example
///
/// ```no_run
/// use mevrebels_indexer::Storage;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let storage = Storage::new("postgresql://localhost/mevrebels").await?;
/// storage.initialize().await?;
/// # Ok(())
/// # }
/// ```
pub struct Storage {
    /// `PostgreSQL` connection pool
    pool: PgPool,
}

impl Storage {
    /// Creates a new storage instance with a connection pool.
    ///
    /// # Errors
    ///
    /// Returns `IndexerError::DatabaseError` if connection fails.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the indexed tables and their uniqueness constraints if missing.
    ///
    /// # Errors
    ///
    /// Returns `IndexerError::DatabaseError` if migration fails.
    pub async fn initialize(&self) -> Result<()> {
        for ddl in SCHEMA {
            sqlx::query(ddl).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Closes the database connection pool, waiting for in-flight queries.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

const SCHEMA: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS strategies (
        id BIGSERIAL PRIMARY KEY,
        creator TEXT NOT NULL,
        strategy_id BIGINT NOT NULL,
        name TEXT NOT NULL,
        profit_threshold BIGINT NOT NULL,
        max_slippage INTEGER NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        signature TEXT,
        slot BIGINT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (creator, strategy_id)
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS executions (
        id BIGSERIAL PRIMARY KEY,
        signature TEXT NOT NULL UNIQUE,
        strategy TEXT NOT NULL,
        executor TEXT NOT NULL,
        profit_lamports BIGINT NOT NULL,
        gas_used BIGINT NOT NULL,
        success BOOLEAN NOT NULL,
        slot BIGINT NOT NULL,
        block_time TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    ",
    r"
    CREATE INDEX IF NOT EXISTS idx_executions_strategy
    ON executions(strategy)
    ",
    r"
    CREATE TABLE IF NOT EXISTS proposals (
        id BIGSERIAL PRIMARY KEY,
        proposer TEXT NOT NULL,
        proposal_id BIGINT NOT NULL,
        title TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'active',
        yes_votes BIGINT NOT NULL DEFAULT 0,
        no_votes BIGINT NOT NULL DEFAULT 0,
        end_time TIMESTAMPTZ NOT NULL,
        signature TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (proposer, proposal_id)
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS votes (
        id BIGSERIAL PRIMARY KEY,
        signature TEXT NOT NULL UNIQUE,
        proposal TEXT NOT NULL,
        voter TEXT NOT NULL,
        vote_type TEXT NOT NULL CHECK (vote_type IN ('for', 'against')),
        vote_weight BIGINT NOT NULL,
        slot BIGINT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS ingestion_cursors (
        program_id TEXT PRIMARY KEY,
        last_signature TEXT NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    ",
];

#[async_trait]
impl PersistenceGateway for Storage {
    async fn upsert_strategy(&self, record: &StrategyRecord) -> Result<RowId> {
        let id = sqlx::query_scalar::<_, i64>(
            r"
            INSERT INTO strategies (
                creator, strategy_id, name, profit_threshold, max_slippage, status, signature, slot
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (creator, strategy_id) DO UPDATE
            SET name = EXCLUDED.name,
                status = EXCLUDED.status,
                updated_at = NOW()
            RETURNING id
            ",
        )
        .bind(&record.creator)
        .bind(record.strategy_id)
        .bind(&record.name)
        .bind(record.profit_threshold)
        .bind(record.max_slippage)
        .bind(record.status.as_ref())
        .bind(&record.signature)
        .bind(record.slot)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn insert_execution_if_absent(&self, record: &ExecutionRecord) -> Result<Option<RowId>> {
        let id = sqlx::query_scalar::<_, i64>(
            r"
            INSERT INTO executions (
                signature, strategy, executor, profit_lamports, gas_used, success, slot, block_time
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, to_timestamp($8))
            ON CONFLICT (signature) DO NOTHING
            RETURNING id
            ",
        )
        .bind(&record.signature)
        .bind(&record.strategy)
        .bind(&record.executor)
        .bind(record.profit)
        .bind(record.gas_used)
        .bind(record.success)
        .bind(record.slot)
        .bind(record.block_time.map(|t| t as f64))
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    async fn upsert_proposal(&self, record: &ProposalRecord) -> Result<RowId> {
        let id = sqlx::query_scalar::<_, i64>(
            r"
            INSERT INTO proposals (
                proposer, proposal_id, title, status, yes_votes, no_votes, end_time, signature
            ) VALUES ($1, $2, $3, $4, $5, $6, to_timestamp($7), $8)
            ON CONFLICT (proposer, proposal_id) DO UPDATE
            SET status = EXCLUDED.status,
                yes_votes = EXCLUDED.yes_votes,
                no_votes = EXCLUDED.no_votes,
                updated_at = NOW()
            RETURNING id
            ",
        )
        .bind(&record.proposer)
        .bind(record.proposal_id)
        .bind(&record.title)
        .bind(record.status.as_ref())
        .bind(record.yes_votes)
        .bind(record.no_votes)
        .bind(record.end_time as f64)
        .bind(&record.signature)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn insert_vote_if_absent(&self, record: &VoteRecord) -> Result<Option<RowId>> {
        let id = sqlx::query_scalar::<_, i64>(
            r"
            INSERT INTO votes (
                signature, proposal, voter, vote_type, vote_weight, slot
            ) VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (signature) DO NOTHING
            RETURNING id
            ",
        )
        .bind(&record.signature)
        .bind(&record.proposal)
        .bind(&record.voter)
        .bind(&record.vote_type)
        .bind(record.vote_weight)
        .bind(record.slot)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }
}

#[async_trait]
impl CursorStore for Storage {
    async fn load_cursor(&self, program_id: &Pubkey) -> Result<Option<String>> {
        let cursor = sqlx::query_scalar::<_, String>(
            "SELECT last_signature FROM ingestion_cursors WHERE program_id = $1",
        )
        .bind(program_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(cursor)
    }

    async fn save_cursor(&self, program_id: &Pubkey, signature: &str) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO ingestion_cursors (program_id, last_signature) VALUES ($1, $2)
            ON CONFLICT (program_id) DO UPDATE
            SET last_signature = EXCLUDED.last_signature,
                updated_at = NOW()
            ",
        )
        .bind(program_id.to_string())
        .bind(signature)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
