//! Configuration management for the indexer.
//!
//! Configuration is assembled with [`IndexerConfigBuilder`] or read from the
//! process environment (and an optional `.env` file) with
//! [`IndexerConfig::from_env`].

use crate::types::events::ProgramRole;
use crate::utils::error::{IndexerError, Result};
use serde::{Deserialize, Serialize};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "telemetry")]
use crate::telemetry::TelemetryConfig;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3004;

/// One monitored program and its role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitoredProgram {
    pub program_id: Pubkey,
    pub role: ProgramRole,
}

/// The fixed, process-wide list of monitored programs.
///
/// Immutable once built; clones share the same list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoredPrograms {
    programs: Arc<[MonitoredProgram]>,
}

impl MonitoredPrograms {
    /// Builds the list, preserving order.
    ///
    /// # Errors
    ///
    /// Returns `IndexerError::ConfigError` if a program id appears twice.
    pub fn new(programs: Vec<(Pubkey, ProgramRole)>) -> Result<Self> {
        let mut list: Vec<MonitoredProgram> = Vec::with_capacity(programs.len());
        for (program_id, role) in programs {
            if list.iter().any(|p| p.program_id == program_id) {
                return Err(IndexerError::ConfigError(format!(
                    "Program {program_id} is configured more than once"
                )));
            }
            list.push(MonitoredProgram { program_id, role });
        }
        Ok(Self {
            programs: list.into(),
        })
    }

    #[must_use]
    pub fn role_of(&self, program_id: &Pubkey) -> Option<ProgramRole> {
        self.programs
            .iter()
            .find(|p| &p.program_id == program_id)
            .map(|p| p.role)
    }

    #[must_use]
    pub fn contains(&self, program_id: &Pubkey) -> bool {
        self.role_of(program_id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MonitoredProgram> {
        self.programs.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

/// Commitment level used for RPC reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitmentLevel {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl FromStr for CommitmentLevel {
    type Err = IndexerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "processed" => Ok(Self::Processed),
            "confirmed" => Ok(Self::Confirmed),
            "finalized" => Ok(Self::Finalized),
            other => Err(IndexerError::ConfigError(format!(
                "Invalid commitment level '{other}'"
            ))),
        }
    }
}

impl From<CommitmentLevel> for CommitmentConfig {
    fn from(level: CommitmentLevel) -> Self {
        match level {
            CommitmentLevel::Processed => CommitmentConfig::processed(),
            CommitmentLevel::Confirmed => CommitmentConfig::confirmed(),
            CommitmentLevel::Finalized => CommitmentConfig::finalized(),
        }
    }
}

/// Delay policy after failed poll cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Delay after the first failed cycle. Defaults to the poll interval when
    /// built from the environment.
    pub initial_backoff_ms: u64,
    /// Multiplier per consecutive failed cycle. `1.0` keeps the interval fixed.
    pub backoff_multiplier: f64,
    /// Upper bound on any delay.
    pub max_backoff_ms: u64,
    /// Apply ±25 % jitter to grown delays.
    pub jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 5_000,
            backoff_multiplier: 2.0,
            max_backoff_ms: 60_000,
            jitter: false,
        }
    }
}

/// Poll adapter settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Run the poll adapter at all.
    pub enabled: bool,
    /// Pause between cycles (default: 5s).
    pub interval_secs: u64,
    /// Maximum transactions fetched per program per cycle (default: 100).
    pub batch_size: usize,
    /// Signatures requested per listing call (default: 100).
    pub page_size: usize,
    /// Listing calls per program per cycle before giving up on reaching the cursor (default: 10).
    pub max_scan_pages: usize,
    /// Checkpoint cursors in the store so restarts resume (default: true).
    pub persist_cursors: bool,
    pub commitment: CommitmentLevel,
    pub backoff: BackoffConfig,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 5,
            batch_size: 100,
            page_size: 100,
            max_scan_pages: 10,
            persist_cursors: true,
            commitment: CommitmentLevel::default(),
            backoff: BackoffConfig::default(),
        }
    }
}

impl PollerConfig {
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Push front door settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookConfig {
    pub bind_addr: SocketAddr,
    /// Shared secret for `X-Webhook-Signature`. `None` accepts unsigned requests.
    pub secret: Option<String>,
}

/// Configuration for the indexer process.
///
/// Use [`IndexerConfigBuilder`] to construct instances.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Database connection URL, or `memory://` for the in-process store.
    pub database_url: String,
    pub rpc_url: String,
    pub programs: MonitoredPrograms,
    pub poller: PollerConfig,
    pub webhook: WebhookConfig,
    #[cfg(feature = "telemetry")]
    pub telemetry: TelemetryConfig,
}

impl IndexerConfig {
    /// Reads configuration from the environment after loading `.env`, if present.
    ///
    /// # Errors
    ///
    /// Returns `IndexerError::ConfigError` for missing or malformed variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, which maps a variable name to its value.
    ///
    /// # Errors
    ///
    /// Returns `IndexerError::ConfigError` for missing or malformed variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = IndexerConfigBuilder::new();

        if let Some(url) = lookup("DATABASE_URL") {
            builder = builder.with_database(url);
        }
        if let Some(url) = lookup("RPC_URL") {
            builder = builder.with_rpc(url);
        }
        for (var, role) in [
            ("STRATEGY_REGISTRY_PROGRAM_ID", ProgramRole::StrategyRegistry),
            ("EXECUTION_ENGINE_PROGRAM_ID", ProgramRole::ExecutionEngine),
            ("DAO_GOVERNANCE_PROGRAM_ID", ProgramRole::DaoGovernance),
            ("FLASH_LOAN_PROGRAM_ID", ProgramRole::FlashLoan),
        ] {
            let id = lookup(var)
                .ok_or_else(|| IndexerError::ConfigError(format!("{var} is required")))?;
            builder = builder.program(id, role);
        }

        if let Some(secret) = lookup("HELIUS_WEBHOOK_SECRET").filter(|s| !s.is_empty()) {
            builder = builder.with_webhook_secret(secret);
        }
        let host = lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse_var(&lookup, "PORT")?.unwrap_or(DEFAULT_PORT);
        builder = builder.with_bind_addr(format!("{host}:{port}"));

        if let Some(secs) = parse_var(&lookup, "POLLING_INTERVAL_SECONDS")? {
            builder = builder.with_poll_interval(secs);
        }
        if let Some(size) = parse_var(&lookup, "BATCH_SIZE")? {
            builder = builder.with_batch_size(size);
        }
        if let Some(size) = parse_var(&lookup, "SIGNATURE_PAGE_SIZE")? {
            builder = builder.with_page_size(size);
        }
        if let Some(pages) = parse_var(&lookup, "MAX_SCAN_PAGES")? {
            builder = builder.with_max_scan_pages(pages);
        }
        if let Some(enabled) = parse_var(&lookup, "POLLING_ENABLED")? {
            builder = builder.with_polling_enabled(enabled);
        }
        if let Some(persist) = parse_var(&lookup, "PERSIST_CURSORS")? {
            builder = builder.with_persist_cursors(persist);
        }
        if let Some(level) = lookup("COMMITMENT") {
            builder = builder.with_commitment(level.parse()?);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "BACKOFF_MAX_SECONDS")? {
            builder = builder.with_max_backoff(Duration::from_secs(secs));
        }
        if let Some(multiplier) = parse_var(&lookup, "BACKOFF_MULTIPLIER")? {
            builder = builder.with_backoff_multiplier(multiplier);
        }
        #[cfg(feature = "telemetry")]
        if let Some(level) = lookup("LOG_LEVEL") {
            builder = builder.with_log_filter(level);
        }
        #[cfg(feature = "telemetry")]
        if lookup("NO_COLOR").is_some_and(|v| !v.is_empty()) {
            builder = builder.with_console_colors(false);
        }

        builder.build()
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| IndexerError::ConfigError(format!("Invalid {key} '{raw}': {e}")))
        })
        .transpose()
}

/// Builder for `IndexerConfig`.
///
/// All required fields must be set before calling `build()`.
///
/// # Example
///
/// ```no_run
/// use mevrebels_indexer::{IndexerConfigBuilder, ProgramRole};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = IndexerConfigBuilder::new()
///     .with_rpc("http://127.0.0.1:8899")
///     .with_database("postgresql://localhost/mevrebels")
///     .program("11111111111111111111111111111111", ProgramRole::StrategyRegistry)
///     .with_poll_interval(10)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct IndexerConfigBuilder {
    database_url: Option<String>,
    rpc_url: Option<String>,
    programs: Vec<(String, ProgramRole)>,
    webhook_secret: Option<String>,
    bind_addr: Option<String>,
    poller: PollerConfig,
    custom_backoff: bool,
    #[cfg(feature = "telemetry")]
    telemetry: TelemetryConfig,
}

impl IndexerConfigBuilder {
    /// Creates a new configuration builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the Solana RPC endpoint URL used by the poll adapter.
    #[must_use]
    pub fn with_rpc(mut self, url: impl Into<String>) -> Self {
        self.rpc_url = Some(url.into());
        self
    }

    /// Sets the database connection URL.
    #[must_use]
    pub fn with_database(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    /// Adds a monitored program (base58 id) with its role.
    #[must_use]
    pub fn program(mut self, program_id: impl Into<String>, role: ProgramRole) -> Self {
        self.programs.push((program_id.into(), role));
        self
    }

    #[must_use]
    pub fn with_webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secret = Some(secret.into());
        self
    }

    /// Sets the `host:port` the push front door listens on.
    #[must_use]
    pub fn with_bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = Some(addr.into());
        self
    }

    /// Sets the polling interval in seconds.
    #[must_use]
    pub fn with_poll_interval(mut self, secs: u64) -> Self {
        self.poller.interval_secs = secs;
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.poller.batch_size = size;
        self
    }

    #[must_use]
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.poller.page_size = size;
        self
    }

    #[must_use]
    pub fn with_max_scan_pages(mut self, pages: usize) -> Self {
        self.poller.max_scan_pages = pages;
        self
    }

    #[must_use]
    pub fn with_polling_enabled(mut self, enabled: bool) -> Self {
        self.poller.enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_persist_cursors(mut self, persist: bool) -> Self {
        self.poller.persist_cursors = persist;
        self
    }

    #[must_use]
    pub fn with_commitment(mut self, level: CommitmentLevel) -> Self {
        self.poller.commitment = level;
        self
    }

    /// Replaces the whole backoff policy, including its initial delay.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.poller.backoff = backoff;
        self.custom_backoff = true;
        self
    }

    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.poller.backoff.backoff_multiplier = multiplier;
        self
    }

    #[must_use]
    pub fn with_max_backoff(mut self, max: Duration) -> Self {
        self.poller.backoff.max_backoff_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[cfg(feature = "telemetry")]
    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.telemetry.log_filter = filter.into();
        self
    }

    #[cfg(feature = "telemetry")]
    #[must_use]
    pub fn with_console_colors(mut self, enabled: bool) -> Self {
        self.telemetry.console_colors = enabled;
        self
    }

    #[cfg(feature = "telemetry")]
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: TelemetryConfig) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Builds the `IndexerConfig`.
    ///
    /// # Errors
    ///
    /// Returns `IndexerError::ConfigError` if required fields are missing,
    /// a program id is invalid or duplicated, or a numeric setting is out of range.
    pub fn build(self) -> Result<IndexerConfig> {
        let database_url = self
            .database_url
            .ok_or_else(|| IndexerError::ConfigError("Database URL is required".to_string()))?;
        let rpc_url = self
            .rpc_url
            .ok_or_else(|| IndexerError::ConfigError("RPC URL is required".to_string()))?;

        if self.programs.is_empty() {
            return Err(IndexerError::ConfigError(
                "At least one program ID is required".to_string(),
            ));
        }
        let mut programs = Vec::with_capacity(self.programs.len());
        for (raw, role) in self.programs {
            let program_id = Pubkey::from_str(&raw).map_err(|e| {
                IndexerError::ConfigError(format!("Invalid program ID '{raw}' for {role}: {e}"))
            })?;
            programs.push((program_id, role));
        }
        let programs = MonitoredPrograms::new(programs)?;

        let bind = self
            .bind_addr
            .unwrap_or_else(|| format!("{DEFAULT_HOST}:{DEFAULT_PORT}"));
        let bind_addr = bind
            .parse::<SocketAddr>()
            .map_err(|e| IndexerError::ConfigError(format!("Invalid bind address '{bind}': {e}")))?;

        let mut poller = self.poller;
        if poller.interval_secs == 0 {
            return Err(IndexerError::ConfigError(
                "Polling interval must be at least 1 second".to_string(),
            ));
        }
        if poller.batch_size == 0 || poller.page_size == 0 || poller.max_scan_pages == 0 {
            return Err(IndexerError::ConfigError(
                "Batch size, page size and max scan pages must be positive".to_string(),
            ));
        }
        if poller.backoff.backoff_multiplier.is_nan() || poller.backoff.backoff_multiplier < 1.0 {
            return Err(IndexerError::ConfigError(
                "Backoff multiplier must be >= 1.0".to_string(),
            ));
        }
        if !self.custom_backoff {
            poller.backoff.initial_backoff_ms = poller.interval_secs.saturating_mul(1_000);
        }
        poller.backoff.max_backoff_ms = poller
            .backoff
            .max_backoff_ms
            .max(poller.backoff.initial_backoff_ms);

        Ok(IndexerConfig {
            database_url,
            rpc_url,
            programs,
            poller,
            webhook: WebhookConfig {
                bind_addr,
                secret: self.webhook_secret,
            },
            #[cfg(feature = "telemetry")]
            telemetry: self.telemetry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const REGISTRY: &str = "11111111111111111111111111111111";
    const ENGINE: &str = "SysvarC1ock11111111111111111111111111111111";
    const DAO: &str = "SysvarRent111111111111111111111111111111111";
    const FLASH: &str = "Vote111111111111111111111111111111111111111";

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn base_env() -> Vec<(&'static str, &'static str)> {
        vec![
            ("DATABASE_URL", "postgresql://localhost/db"),
            ("RPC_URL", "http://127.0.0.1:8899"),
            ("STRATEGY_REGISTRY_PROGRAM_ID", REGISTRY),
            ("EXECUTION_ENGINE_PROGRAM_ID", ENGINE),
            ("DAO_GOVERNANCE_PROGRAM_ID", DAO),
            ("FLASH_LOAN_PROGRAM_ID", FLASH),
        ]
    }

    #[test]
    fn test_builder_missing_required_fields() {
        let result = IndexerConfigBuilder::new().build();
        assert!(matches!(result, Err(IndexerError::ConfigError(_))));
    }

    #[test]
    fn test_builder_invalid_program_id() {
        let result = IndexerConfigBuilder::new()
            .with_rpc("http://127.0.0.1:8899")
            .with_database("postgresql://localhost/db")
            .program("invalid_pubkey", ProgramRole::StrategyRegistry)
            .build();

        match result {
            Err(IndexerError::ConfigError(msg)) => assert!(msg.contains("Invalid program ID")),
            other => panic!("expected ConfigError, got {other:?}"),
        }
    }

    #[test]
    fn test_builder_duplicate_program_rejected() {
        let result = IndexerConfigBuilder::new()
            .with_rpc("http://127.0.0.1:8899")
            .with_database("postgresql://localhost/db")
            .program(REGISTRY, ProgramRole::StrategyRegistry)
            .program(REGISTRY, ProgramRole::DaoGovernance)
            .build();
        assert!(matches!(result, Err(IndexerError::ConfigError(_))));
    }

    #[test]
    fn test_builder_defaults() {
        let config = IndexerConfigBuilder::new()
            .with_rpc("http://127.0.0.1:8899")
            .with_database("postgresql://localhost/db")
            .program(REGISTRY, ProgramRole::StrategyRegistry)
            .build()
            .unwrap();

        assert_eq!(config.poller.interval_secs, 5);
        assert_eq!(config.poller.batch_size, 100);
        assert!(config.poller.persist_cursors);
        assert_eq!(config.poller.backoff.initial_backoff_ms, 5_000);
        assert_eq!(config.webhook.bind_addr.port(), 3004);
        assert!(config.webhook.secret.is_none());
    }

    #[test]
    fn test_from_lookup_reads_all_programs_in_order() {
        let config = IndexerConfig::from_lookup(env(&base_env())).unwrap();
        let roles: Vec<ProgramRole> = config.programs.iter().map(|p| p.role).collect();
        assert_eq!(
            roles,
            vec![
                ProgramRole::StrategyRegistry,
                ProgramRole::ExecutionEngine,
                ProgramRole::DaoGovernance,
                ProgramRole::FlashLoan,
            ]
        );
        assert_eq!(
            config.programs.role_of(&Pubkey::from_str(DAO).unwrap()),
            Some(ProgramRole::DaoGovernance)
        );
    }

    #[test]
    fn test_from_lookup_overrides() {
        let mut vars = base_env();
        vars.extend([
            ("POLLING_INTERVAL_SECONDS", "2"),
            ("BATCH_SIZE", "10"),
            ("PORT", "8080"),
            ("HELIUS_WEBHOOK_SECRET", "s3cret"),
            ("PERSIST_CURSORS", "false"),
            ("BACKOFF_MAX_SECONDS", "30"),
            ("LOG_LEVEL", "mevrebels_indexer=debug"),
            ("NO_COLOR", "1"),
        ]);
        let config = IndexerConfig::from_lookup(env(&vars)).unwrap();

        assert_eq!(config.poller.interval(), Duration::from_secs(2));
        assert_eq!(config.poller.batch_size, 10);
        assert_eq!(config.webhook.bind_addr.port(), 8080);
        assert_eq!(config.webhook.secret.as_deref(), Some("s3cret"));
        assert!(!config.poller.persist_cursors);
        assert_eq!(config.poller.backoff.initial_backoff_ms, 2_000);
        assert_eq!(config.poller.backoff.max_backoff_ms, 30_000);
        #[cfg(feature = "telemetry")]
        {
            assert_eq!(config.telemetry.log_filter, "mevrebels_indexer=debug");
            assert!(!config.telemetry.console_colors);
        }
    }

    #[test]
    fn test_from_lookup_missing_program() {
        let vars: Vec<_> = base_env()
            .into_iter()
            .filter(|(k, _)| *k != "FLASH_LOAN_PROGRAM_ID")
            .collect();
        match IndexerConfig::from_lookup(env(&vars)) {
            Err(IndexerError::ConfigError(msg)) => assert!(msg.contains("FLASH_LOAN_PROGRAM_ID")),
            other => panic!("expected ConfigError, got {other:?}"),
        }
    }

    #[test]
    fn test_from_lookup_malformed_number() {
        let mut vars = base_env();
        vars.push(("BATCH_SIZE", "lots"));
        assert!(matches!(
            IndexerConfig::from_lookup(env(&vars)),
            Err(IndexerError::ConfigError(msg)) if msg.contains("BATCH_SIZE")
        ));
    }
}
