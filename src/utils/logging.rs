//! Logging helpers on top of `tracing`.
//!
//! Summary helpers are silenced by `MEVREBELS_INDEXER_SILENT`; error logging never is.

const SILENT_VAR: &str = "MEVREBELS_INDEXER_SILENT";

fn silent() -> bool {
    std::env::var_os(SILENT_VAR).is_some()
}

/// Strips the value of an `api-key=` query parameter.
#[must_use]
pub fn redact_url(url: &str) -> String {
    let Some(pos) = url.find("api-key=") else {
        return url.to_string();
    };
    let before = &url[..pos + 8];
    let after = &url[pos + 8..];
    let end_pos = after.find('&').unwrap_or(after.len());
    format!("{before}[REDACTED]{}", &after[end_pos..])
}

/// Logs indexer startup information.
pub fn log_startup(programs: usize, rpc_url: &str, poll_interval: u64, bind_addr: &str) {
    if silent() {
        return;
    }
    tracing::info!(
        programs = programs,
        rpc_url = %redact_url(rpc_url),
        poll_interval_s = poll_interval,
        bind_addr = bind_addr,
        "MEVrebels indexer startup"
    );
}

/// Logs transaction processing.
pub fn log_transaction(signature: &str, slot: u64, rows: usize) {
    tracing::debug!(
        signature = signature,
        slot = slot,
        rows = rows,
        "Processed transaction"
    );
}

/// Logs batch processing summary.
pub fn log_batch(processed: usize, total: usize, duration_ms: u64) {
    if silent() || total == 0 {
        return;
    }
    tracing::info!(
        processed = processed,
        total = total,
        duration_ms = duration_ms,
        "Batch processed"
    );
}
