//! MEVrebels indexer binary.
//!
//! Reads configuration from the environment (and `.env`), then runs the
//! webhook server and, when enabled, the RPC poller until Ctrl-C.

use mevrebels_indexer::{
    CursorStore, DefaultRpcProvider, EventDecoder, IndexerConfig, IndexerError, IngestionCoordinator,
    LogExtractor, MemoryStore, PersistenceGateway, Poller, Result, Storage, WebhookState,
    streams::webhook, telemetry, utils::logging,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

const MEMORY_URL_SCHEME: &str = "memory://";

#[tokio::main]
async fn main() -> Result<()> {
    let config = IndexerConfig::from_env()?;
    let _telemetry = telemetry::init_telemetry(config.telemetry.clone());

    logging::log_startup(
        config.programs.len(),
        &config.rpc_url,
        config.poller.interval_secs,
        &config.webhook.bind_addr.to_string(),
    );

    if config.database_url.starts_with(MEMORY_URL_SCHEME) {
        tracing::warn!("Using the in-memory store, indexed data is lost on exit");
        return run(config, Arc::new(MemoryStore::new())).await;
    }

    let storage = Arc::new(Storage::new(&config.database_url).await?);
    storage.initialize().await?;
    tracing::info!("Database schema ready");

    let outcome = run(config, Arc::clone(&storage)).await;
    storage.close().await;
    outcome
}

async fn run<S>(config: IndexerConfig, store: Arc<S>) -> Result<()>
where
    S: PersistenceGateway + CursorStore + 'static,
{
    let extractor = LogExtractor::new(EventDecoder::new(config.programs.clone()));
    let coordinator = Arc::new(IngestionCoordinator::new(extractor, store.clone()));
    let shutdown = CancellationToken::new();

    let poller = if config.poller.enabled {
        let rpc = Arc::new(DefaultRpcProvider::new_with_commitment(
            &config.rpc_url,
            config.poller.commitment.into(),
        ));
        let poller = Poller::new(
            rpc,
            Arc::clone(&coordinator),
            config.programs.clone(),
            config.poller.clone(),
        )
        .with_cursor_store(store)
        .with_cancellation_token(shutdown.child_token());
        let handle = poller.handle();
        Some((handle, tokio::spawn(poller.run())))
    } else {
        tracing::info!("Polling disabled, relying on webhook delivery only");
        None
    };

    if config.webhook.secret.is_none() {
        tracing::warn!("No webhook secret configured, accepting unsigned requests");
    }

    let listener = TcpListener::bind(config.webhook.bind_addr)
        .await
        .map_err(|e| {
            IndexerError::WebhookError(format!("Failed to bind {}: {e}", config.webhook.bind_addr))
        })?;
    let state = WebhookState::new(Arc::clone(&coordinator), config.webhook.secret.clone());

    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
        }
        signal.cancel();
    });

    let server_token = shutdown.clone();
    let served = webhook::serve(listener, state, async move {
        server_token.cancelled().await;
    })
    .await;

    if let Some((handle, task)) = poller {
        handle.stop();
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Poller task ended abnormally");
        }
    }

    coordinator.metrics().report();
    served
}
