//! Transaction envelopes as both producers deliver them, and the provenance
//! attached to every decoded event.

use crate::types::events::DecodedEvent;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

/// Execution metadata of a transaction. Only the parts the pipeline reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMeta {
    /// Program output, one entry per line, in emission order.
    #[serde(default)]
    pub log_messages: Option<Vec<String>>,

    /// Set when the transaction failed on-chain.
    #[serde(default)]
    pub err: Option<serde_json::Value>,
}

/// A transaction as delivered by the webhook or fetched by the poller.
///
/// Deserializes from the JSON shape both feeds share:
/// `{ "signature", "slot", "blockTime", "meta": { "logMessages", "err" } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionEnvelope {
    pub signature: String,

    #[serde(default)]
    pub slot: u64,

    /// Unix seconds; enhanced webhook payloads call it `timestamp`.
    #[serde(default, alias = "timestamp")]
    pub block_time: Option<i64>,

    #[serde(default)]
    pub meta: Option<TransactionMeta>,
}

impl TransactionEnvelope {
    /// Builds a successful transaction carrying `logs`.
    #[must_use]
    pub fn with_logs(signature: impl Into<String>, slot: u64, logs: Vec<String>) -> Self {
        Self {
            signature: signature.into(),
            slot,
            block_time: None,
            meta: Some(TransactionMeta {
                log_messages: Some(logs),
                err: None,
            }),
        }
    }

    /// Log lines, or `None` when the transaction carries no log metadata.
    #[must_use]
    pub fn log_messages(&self) -> Option<&[String]> {
        self.meta.as_ref()?.log_messages.as_deref()
    }

    /// Whether the chain reported an execution error for this transaction.
    #[must_use]
    pub fn failed(&self) -> bool {
        self.meta
            .as_ref()
            .is_some_and(|meta| meta.err.as_ref().is_some_and(|err| !err.is_null()))
    }
}

/// One entry of a signature listing, newest-first as the node returns them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureInfo {
    pub signature: String,
    pub slot: u64,
    pub block_time: Option<i64>,
    /// The transaction failed on-chain.
    pub failed: bool,
}

/// A decoded event with the provenance of the transaction that carried it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedEvent {
    pub event: DecodedEvent,
    /// Program the payload was decoded under.
    pub program_id: Pubkey,
    pub signature: String,
    pub slot: u64,
    pub block_time: Option<i64>,
}
