//! Error types for the indexer.
//!
//! [`IndexerError`] covers every failure that can cross a component boundary.
//! [`DecodeError`] is the structured failure of the binary event decoder; it
//! never travels past the log extractor, which logs and skips the payload.

use crate::types::events::EventKind;
use thiserror::Error;

/// Custom error type for indexer operations.
///
/// Covers configuration issues, RPC communication, persistence and the push
/// front door. Persistence failures that make the store unreachable are
/// classified by [`IndexerError::is_store_unavailable`] so callers can treat
/// the whole unit of work as failed.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// Errors encountered during database operations.
    ///
    /// This variant automatically wraps `sqlx::Error` using the `#[from]` attribute,
    /// allowing seamless error propagation with the `?` operator.
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// Errors interacting with the Solana RPC.
    ///
    /// This covers network failures, timeout errors, or unexpected responses
    /// from the Solana RPC endpoint.
    #[error("RPC error: {0}")]
    RpcError(String),

    /// Low-level `solana-client` failure.
    #[error("RPC client error: {0}")]
    RpcClientError(Box<solana_client::client_error::ClientError>),

    /// Errors related to configuration.
    ///
    /// This includes missing environment variables, invalid configuration values,
    /// or failures in parsing configuration data.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A value could not be represented in the store (e.g. a `u64` wider than `BIGINT`).
    #[error("Data error: {0}")]
    DataError(String),

    /// The persistence layer cannot be reached at all.
    ///
    /// Raised for the unit of work (one transaction, one poll page) rather than
    /// for a single event; the next cycle or push call retries.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Push front door failures (bad signature, malformed body).
    #[error("Webhook error: {0}")]
    WebhookError(String),

    /// Generic errors for operations that don't fit other categories.
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl IndexerError {
    /// Returns `true` when the failure means the store itself is unreachable,
    /// as opposed to a single rejected row.
    #[must_use]
    pub fn is_store_unavailable(&self) -> bool {
        match self {
            Self::StoreUnavailable(_) => true,
            Self::DatabaseError(err) => matches!(
                err,
                sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
                    | sqlx::Error::WorkerCrashed
            ),
            _ => false,
        }
    }
}

impl From<solana_client::client_error::ClientError> for IndexerError {
    fn from(err: solana_client::client_error::ClientError) -> Self {
        Self::RpcClientError(Box::new(err))
    }
}

/// Type alias for Results using `IndexerError`.
pub type Result<T> = std::result::Result<T, IndexerError>;

/// Why a payload with a recognised discriminator could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeFailure {
    /// A fixed-width field ran past the end of the buffer.
    #[error("needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    /// A length prefix declared more bytes than the buffer holds.
    #[error("length prefix declares {declared} bytes, {remaining} remaining")]
    LengthOverrun { declared: usize, remaining: usize },

    /// String bytes were not valid UTF-8.
    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    /// A single-byte enumeration held a value outside its table.
    #[error("invalid value {value} for {field}")]
    InvalidEnum { field: &'static str, value: u8 },
}

/// Structured decoder failure: which kind was being decoded and where it broke.
///
/// `offset` counts from the first byte of the payload, discriminator included.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to decode {kind} at byte {offset}: {reason}")]
pub struct DecodeError {
    pub kind: EventKind,
    pub offset: usize,
    pub reason: DecodeFailure,
}
