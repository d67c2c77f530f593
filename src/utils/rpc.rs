use async_trait::async_trait;
use serde_json::json;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_client::GetConfirmedSignaturesForAddress2Config;
use solana_client::rpc_config::RpcTransactionConfig;
use solana_client::rpc_request::RpcRequest;
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey, signature::Signature};
use solana_transaction_status::{
    EncodedConfirmedTransactionWithStatusMeta, UiTransactionEncoding,
};
use std::str::FromStr;

use crate::types::transaction::{SignatureInfo, TransactionEnvelope, TransactionMeta};
use crate::utils::error::{IndexerError, Result};

/// The two reads the poll adapter needs from a chain node.
#[async_trait]
pub trait RpcProvider: Send + Sync {
    /// Signatures involving `address`, newest-first, strictly older than
    /// `before` and strictly newer than `until` when given.
    async fn get_signatures_for_address(
        &self,
        address: &Pubkey,
        before: Option<&str>,
        until: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>>;

    /// Full transaction with logs, or `None` if the node does not have it.
    async fn get_transaction(&self, signature: &str) -> Result<Option<TransactionEnvelope>>;
}

pub struct DefaultRpcProvider {
    client: RpcClient,
    commitment: CommitmentConfig,
}

impl DefaultRpcProvider {
    /// Creates a provider connecting to `rpc_url` with `confirmed` commitment.
    pub fn new(rpc_url: &str) -> Self {
        Self::new_with_commitment(rpc_url, CommitmentConfig::confirmed())
    }

    /// Creates a provider with a specific commitment configuration.
    pub fn new_with_commitment(rpc_url: &str, commitment: CommitmentConfig) -> Self {
        Self {
            client: RpcClient::new_with_commitment(rpc_url.to_string(), commitment),
            commitment,
        }
    }
}

fn parse_signature(raw: &str) -> Result<Signature> {
    Signature::from_str(raw)
        .map_err(|e| IndexerError::RpcError(format!("Invalid signature '{raw}': {e}")))
}

fn into_envelope(
    signature: &str,
    tx: EncodedConfirmedTransactionWithStatusMeta,
) -> TransactionEnvelope {
    let meta = tx.transaction.meta.map(|meta| TransactionMeta {
        log_messages: Option::<Vec<String>>::from(meta.log_messages),
        err: meta.err.and_then(|err| serde_json::to_value(err).ok()),
    });
    TransactionEnvelope {
        signature: signature.to_string(),
        slot: tx.slot,
        block_time: tx.block_time,
        meta,
    }
}

#[async_trait]
impl RpcProvider for DefaultRpcProvider {
    async fn get_signatures_for_address(
        &self,
        address: &Pubkey,
        before: Option<&str>,
        until: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>> {
        let config = GetConfirmedSignaturesForAddress2Config {
            before: before.map(parse_signature).transpose()?,
            until: until.map(parse_signature).transpose()?,
            limit: Some(limit),
            commitment: Some(self.commitment),
        };
        let statuses = self
            .client
            .get_signatures_for_address_with_config(address, config)
            .await?;

        Ok(statuses
            .into_iter()
            .map(|status| SignatureInfo {
                signature: status.signature,
                slot: status.slot,
                block_time: status.block_time,
                failed: status.err.is_some(),
            })
            .collect())
    }

    async fn get_transaction(&self, signature: &str) -> Result<Option<TransactionEnvelope>> {
        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::Json),
            commitment: Some(self.commitment),
            max_supported_transaction_version: Some(0),
        };
        // A `null` result means the node does not have the transaction.
        let tx = self
            .client
            .send::<Option<EncodedConfirmedTransactionWithStatusMeta>>(
                RpcRequest::GetTransaction,
                json!([signature, config]),
            )
            .await?;

        Ok(tx.map(|tx| into_envelope(signature, tx)))
    }
}
