//! In-process store with the same uniqueness contract as the `PostgreSQL`
//! backend. Backs tests and `memory://` dry runs.

use super::{CursorStore, PersistenceGateway};
use crate::types::records::{ExecutionRecord, ProposalRecord, RowId, StrategyRecord, VoteRecord};
use crate::utils::error::Result;
use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct Tables {
    next_id: RowId,
    strategies: HashMap<(String, i64), (RowId, StrategyRecord)>,
    executions: HashMap<String, (RowId, ExecutionRecord)>,
    proposals: HashMap<(String, i64), (RowId, ProposalRecord)>,
    votes: HashMap<String, (RowId, VoteRecord)>,
    cursors: HashMap<Pubkey, String>,
}

impl Tables {
    fn allocate(&mut self) -> RowId {
        self.next_id += 1;
        self.next_id
    }
}

/// Every operation holds the table lock for its whole read-modify-write, so a
/// conflicting concurrent write resolves exactly as a single-row upsert would.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn strategies(&self) -> Vec<StrategyRecord> {
        let tables = self.tables.lock().await;
        tables.strategies.values().map(|(_, r)| r.clone()).collect()
    }

    pub async fn executions(&self) -> Vec<ExecutionRecord> {
        let tables = self.tables.lock().await;
        tables.executions.values().map(|(_, r)| r.clone()).collect()
    }

    pub async fn proposals(&self) -> Vec<ProposalRecord> {
        let tables = self.tables.lock().await;
        tables.proposals.values().map(|(_, r)| r.clone()).collect()
    }

    pub async fn votes(&self) -> Vec<VoteRecord> {
        let tables = self.tables.lock().await;
        tables.votes.values().map(|(_, r)| r.clone()).collect()
    }
}

#[async_trait]
impl PersistenceGateway for MemoryStore {
    async fn upsert_strategy(&self, record: &StrategyRecord) -> Result<RowId> {
        let mut tables = self.tables.lock().await;
        let key = (record.creator.clone(), record.strategy_id);
        if let Some((id, existing)) = tables.strategies.get_mut(&key) {
            existing.name.clone_from(&record.name);
            existing.status = record.status;
            return Ok(*id);
        }
        let id = tables.allocate();
        tables.strategies.insert(key, (id, record.clone()));
        Ok(id)
    }

    async fn insert_execution_if_absent(&self, record: &ExecutionRecord) -> Result<Option<RowId>> {
        let mut tables = self.tables.lock().await;
        if tables.executions.contains_key(&record.signature) {
            return Ok(None);
        }
        let id = tables.allocate();
        tables
            .executions
            .insert(record.signature.clone(), (id, record.clone()));
        Ok(Some(id))
    }

    async fn upsert_proposal(&self, record: &ProposalRecord) -> Result<RowId> {
        let mut tables = self.tables.lock().await;
        let key = (record.proposer.clone(), record.proposal_id);
        if let Some((id, existing)) = tables.proposals.get_mut(&key) {
            existing.status = record.status;
            existing.yes_votes = record.yes_votes;
            existing.no_votes = record.no_votes;
            return Ok(*id);
        }
        let id = tables.allocate();
        tables.proposals.insert(key, (id, record.clone()));
        Ok(id)
    }

    async fn insert_vote_if_absent(&self, record: &VoteRecord) -> Result<Option<RowId>> {
        let mut tables = self.tables.lock().await;
        if tables.votes.contains_key(&record.signature) {
            return Ok(None);
        }
        let id = tables.allocate();
        tables
            .votes
            .insert(record.signature.clone(), (id, record.clone()));
        Ok(Some(id))
    }
}

#[async_trait]
impl CursorStore for MemoryStore {
    async fn load_cursor(&self, program_id: &Pubkey) -> Result<Option<String>> {
        Ok(self.tables.lock().await.cursors.get(program_id).cloned())
    }

    async fn save_cursor(&self, program_id: &Pubkey, signature: &str) -> Result<()> {
        self.tables
            .lock()
            .await
            .cursors
            .insert(*program_id, signature.to_string());
        Ok(())
    }
}
