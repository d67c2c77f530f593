//! Push front door: an HTTP endpoint for webhook deliveries.
//!
//! Authenticated batches are parsed into [`TransactionEnvelope`]s and handed
//! to [`IngestionCoordinator::process_batch`]. The same transactions may also
//! arrive through the poller; the coordinator absorbs the overlap.

use crate::core::coordinator::IngestionCoordinator;
use crate::types::transaction::TransactionEnvelope;
use crate::utils::error::{IndexerError, Result};
use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use hmac::{Hmac, Mac};
use serde_json::{Value, json};
use sha2::Sha256;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Header carrying the hex HMAC-SHA256 of the raw request body.
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Payload type accepted for ingestion.
pub const ENHANCED_PAYLOAD: &str = "ENHANCED";

type HmacSha256 = Hmac<Sha256>;

/// Shared state of the webhook router.
#[derive(Clone)]
pub struct WebhookState {
    coordinator: Arc<IngestionCoordinator>,
    secret: Option<Arc<str>>,
}

impl WebhookState {
    #[must_use]
    pub fn new(coordinator: Arc<IngestionCoordinator>, secret: Option<String>) -> Self {
        Self {
            coordinator,
            secret: secret.map(Arc::from),
        }
    }
}

fn keyed_mac(body: &[u8], secret: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(mac)
}

/// Hex HMAC-SHA256 of `body` under `secret`, as senders compute it.
#[must_use]
pub fn sign_payload(body: &[u8], secret: &str) -> Option<String> {
    keyed_mac(body, secret).map(|mac| hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a hex signature over `body`.
#[must_use]
pub fn verify_signature(body: &[u8], signature_hex: &str, secret: &str) -> bool {
    let Ok(expected) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    keyed_mac(body, secret).is_some_and(|mac| mac.verify_slice(&expected).is_ok())
}

/// Router with `POST /webhook/helius`, `GET /health` and `GET /stats`.
pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook/helius", post(receive_webhook))
        .route("/health", get(health_check))
        .route("/stats", get(stats))
        .with_state(state)
}

/// Serves `router` on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns `IndexerError::WebhookError` if the server fails.
pub async fn serve<F>(listener: TcpListener, state: WebhookState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr().ok();
    tracing::info!(bind_addr = ?addr, "Webhook server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| IndexerError::WebhookError(format!("Webhook server failed: {e}")))?;
    tracing::info!("Webhook server stopped");
    Ok(())
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Parses each entry on its own; malformed entries are skipped.
fn parse_transactions(payload: &Value) -> Vec<TransactionEnvelope> {
    let Some(entries) = payload.get("transactions").and_then(Value::as_array) else {
        return Vec::new();
    };

    entries
        .iter()
        .enumerate()
        .filter_map(
            |(index, entry)| match serde_json::from_value::<TransactionEnvelope>(entry.clone()) {
                Ok(tx) => Some(tx),
                Err(e) => {
                    tracing::warn!(index, error = %e, "Skipping malformed webhook transaction");
                    None
                }
            },
        )
        .collect()
}

async fn receive_webhook(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(secret) = state.secret.as_deref() {
        let provided = headers
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok());
        match provided {
            Some(signature) if verify_signature(&body, signature, secret) => {}
            Some(_) => {
                tracing::warn!("Rejected webhook with invalid signature");
                return error_response(StatusCode::UNAUTHORIZED, "Invalid webhook signature");
            }
            None => {
                tracing::warn!("Rejected webhook without signature");
                return error_response(StatusCode::UNAUTHORIZED, "Missing webhook signature");
            }
        }
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected webhook with malformed JSON");
            return error_response(StatusCode::BAD_REQUEST, "Malformed JSON body");
        }
    };

    let payload_type = payload.get("type").and_then(Value::as_str).unwrap_or("");
    if payload_type != ENHANCED_PAYLOAD {
        tracing::debug!(payload_type, "Ignoring webhook payload type");
        return Json(json!({ "status": "ignored" })).into_response();
    }

    let transactions = parse_transactions(&payload);
    let summary = state.coordinator.process_batch(&transactions).await;

    // A non-2xx status makes the sender redeliver the batch.
    let (status, outcome) = if summary.failed_transactions > 0 {
        tracing::error!(
            failed = summary.failed_transactions,
            received = summary.transactions_received,
            "Store unavailable, webhook batch left for redelivery"
        );
        (StatusCode::SERVICE_UNAVAILABLE, "error")
    } else {
        (StatusCode::OK, "success")
    };

    (
        status,
        Json(json!({
            "status": outcome,
            "transactions_received": summary.transactions_received,
            "transactions_processed": summary.transactions_processed,
            "events_indexed": summary.events_indexed,
            "failed_transactions": summary.failed_transactions,
        })),
    )
        .into_response()
}

async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "mevrebels-indexer"
    }))
}

async fn stats(State(state): State<WebhookState>) -> impl IntoResponse {
    Json(state.coordinator.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_roundtrip() {
        let body = br#"{"type":"ENHANCED","transactions":[]}"#;
        let signature = sign_payload(body, "s3cret").unwrap();
        assert_eq!(signature.len(), 64);
        assert!(verify_signature(body, &signature, "s3cret"));
        assert!(!verify_signature(body, &signature, "other"));
        assert!(!verify_signature(b"tampered", &signature, "s3cret"));
        assert!(!verify_signature(body, "not-hex", "s3cret"));
    }

    #[test]
    fn test_parse_transactions_skips_malformed_entries() {
        let payload = json!({
            "type": "ENHANCED",
            "transactions": [
                { "signature": "SIG1", "slot": 5, "timestamp": 1_700_000_000, "meta": { "logMessages": [] } },
                { "slot": "not-a-number" },
                { "signature": "SIG2" }
            ]
        });
        let parsed = parse_transactions(&payload);
        let signatures: Vec<_> = parsed.iter().map(|tx| tx.signature.as_str()).collect();
        assert_eq!(signatures, ["SIG1", "SIG2"]);
        assert_eq!(parsed[0].block_time, Some(1_700_000_000));
    }

    #[test]
    fn test_parse_transactions_without_array() {
        assert!(parse_transactions(&json!({ "type": "ENHANCED" })).is_empty());
    }
}
