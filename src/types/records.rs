//! Rows handed to the persistence gateway.
//!
//! Records carry store-ready values: base58 keys as strings and integers
//! already checked to fit a signed 64-bit column.

use crate::types::events::{ProposalCreated, StrategyCreated, StrategyExecuted, VoteCast};
use crate::types::transaction::EnrichedEvent;
use crate::utils::error::{IndexerError, Result};
use serde::Serialize;
use strum_macros::{AsRefStr, Display};

/// Store-assigned row identifier.
pub type RowId = i64;

/// Lifecycle status written for newly indexed strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StrategyStatus {
    Pending,
}

/// Lifecycle status written for newly indexed proposals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    Active,
}

/// Unique on `(creator, strategy_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyRecord {
    pub creator: String,
    pub strategy_id: i64,
    pub name: String,
    pub profit_threshold: i64,
    pub max_slippage: i32,
    pub status: StrategyStatus,
    pub signature: String,
    pub slot: i64,
}

/// Unique on `signature`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionRecord {
    pub signature: String,
    pub strategy: String,
    pub executor: String,
    pub profit: i64,
    pub gas_used: i64,
    pub success: bool,
    pub slot: i64,
    pub block_time: Option<i64>,
}

/// Unique on `(proposer, proposal_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProposalRecord {
    pub proposer: String,
    pub proposal_id: i64,
    pub title: String,
    pub status: ProposalStatus,
    pub yes_votes: i64,
    pub no_votes: i64,
    pub end_time: i64,
    pub signature: String,
}

/// Unique on `signature`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteRecord {
    pub signature: String,
    pub proposal: String,
    pub voter: String,
    pub vote_type: String,
    pub vote_weight: i64,
    pub slot: i64,
}

/// Result of one persistence action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// A new row was created, or an existing one updated by its natural key.
    Written(RowId),
    /// The natural key already existed and the action is a no-op.
    AlreadyExists,
    /// The event is accepted but has no row of its own.
    Acknowledged,
}

/// Converts an unsigned chain value into a `BIGINT` column value.
///
/// # Errors
///
/// Returns `IndexerError::DataError` when the value exceeds `i64::MAX`.
pub fn to_bigint(value: u64, field: &str) -> Result<i64> {
    i64::try_from(value)
        .map_err(|_| IndexerError::DataError(format!("{field}={value} exceeds BIGINT range")))
}

impl StrategyRecord {
    /// # Errors
    ///
    /// Returns `IndexerError::DataError` if a numeric field overflows `BIGINT`.
    pub fn from_event(event: &StrategyCreated, ctx: &EnrichedEvent) -> Result<Self> {
        Ok(Self {
            creator: event.creator.to_string(),
            strategy_id: to_bigint(event.strategy_id, "strategy_id")?,
            name: event.name.clone(),
            profit_threshold: to_bigint(event.profit_threshold, "profit_threshold")?,
            max_slippage: i32::from(event.max_slippage),
            status: StrategyStatus::Pending,
            signature: ctx.signature.clone(),
            slot: to_bigint(ctx.slot, "slot")?,
        })
    }
}

impl ExecutionRecord {
    /// # Errors
    ///
    /// Returns `IndexerError::DataError` if a numeric field overflows `BIGINT`.
    pub fn from_event(event: &StrategyExecuted, ctx: &EnrichedEvent) -> Result<Self> {
        Ok(Self {
            signature: ctx.signature.clone(),
            strategy: event.strategy.to_string(),
            executor: event.executor.to_string(),
            profit: to_bigint(event.profit, "profit")?,
            gas_used: i64::from(event.gas_used),
            success: event.success,
            slot: to_bigint(ctx.slot, "slot")?,
            block_time: ctx.block_time,
        })
    }
}

impl ProposalRecord {
    /// # Errors
    ///
    /// Returns `IndexerError::DataError` if a numeric field overflows `BIGINT`.
    pub fn from_event(event: &ProposalCreated, ctx: &EnrichedEvent) -> Result<Self> {
        Ok(Self {
            proposer: event.proposer.to_string(),
            proposal_id: to_bigint(event.proposal_id, "proposal_id")?,
            title: event.title.clone(),
            status: ProposalStatus::Active,
            yes_votes: 0,
            no_votes: 0,
            end_time: to_bigint(event.end_time, "end_time")?,
            signature: ctx.signature.clone(),
        })
    }
}

impl VoteRecord {
    /// # Errors
    ///
    /// Returns `IndexerError::DataError` if a numeric field overflows `BIGINT`.
    pub fn from_event(event: &VoteCast, ctx: &EnrichedEvent) -> Result<Self> {
        Ok(Self {
            signature: ctx.signature.clone(),
            proposal: event.proposal.to_string(),
            voter: event.voter.to_string(),
            vote_type: event.vote_type.to_string(),
            vote_weight: to_bigint(event.vote_weight, "vote_weight")?,
            slot: to_bigint(ctx.slot, "slot")?,
        })
    }
}
