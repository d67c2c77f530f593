//! Poll adapter: cursor-driven retrieval of program transactions.
//!
//! Each cycle walks every monitored program, fetches the signatures newer
//! than that program's cursor, replays the transactions oldest-first through
//! the coordinator and only then moves the cursor. A crash mid-cycle causes
//! re-delivery on restart, never a gap, because writes are idempotent.
//!
//! A backlog deeper than one scan window is walked down over several cycles.
//! Each unreached window leaves a resume anchor, and the cursor only moves once
//! the signatures just above it have been replayed.
//!
//! ```text
//!   Idle ──tick──▶ Polling ──cycle done──▶ Idle
//!     │                │
//!   stop()      stop(), cycle done
//!     └────────────────┴──────────────▶ Stopped
//! ```

use crate::config::{MonitoredPrograms, PollerConfig};
use crate::core::coordinator::IngestionCoordinator;
use crate::storage::CursorStore;
use crate::types::transaction::SignatureInfo;
use crate::utils::error::Result;
use crate::utils::retry::{FailureBackoff, is_transient};
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use strum_macros::Display;
use tokio_util::sync::CancellationToken;

use crate::utils::rpc::RpcProvider;

/// Lifecycle state of the poll adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PollerState {
    Idle,
    Polling,
    Stopped,
}

impl PollerState {
    fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Polling => 1,
            Self::Stopped => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Polling,
            _ => Self::Stopped,
        }
    }
}

/// Observes and stops a running [`Poller`] from another task.
#[derive(Debug, Clone)]
pub struct PollerHandle {
    state: Arc<AtomicU8>,
    token: CancellationToken,
}

impl PollerHandle {
    /// Requests a stop. An in-flight cycle, including its writes, completes first
    /// and the state reads `Polling` until it does.
    pub fn stop(&self) {
        self.token.cancel();
        let _ = self.state.compare_exchange(
            PollerState::Idle.as_u8(),
            PollerState::Stopped.as_u8(),
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    #[must_use]
    pub fn state(&self) -> PollerState {
        PollerState::from_u8(self.state.load(Ordering::SeqCst))
    }
}

/// Totals for one cycle across all programs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub programs_succeeded: usize,
    pub programs_failed: usize,
    pub transactions_processed: usize,
    pub rows_written: usize,
    /// Listed signatures whose body the node no longer returned.
    pub transactions_missing: usize,
}

#[derive(Debug, Default)]
struct ProgramPass {
    transactions: usize,
    rows: usize,
    missing: usize,
    new_cursor: Option<String>,
    anchor: AnchorMove,
}

/// How a pass changes the program's stack of resume anchors.
#[derive(Debug, Default, PartialEq, Eq)]
enum AnchorMove {
    #[default]
    Keep,
    /// The cursor was out of reach; resume below this signature next cycle.
    Descend(String),
    /// Everything between the cursor and the current anchor was replayed.
    Ascend,
}

/// Result of listing signatures between an anchor and the cursor.
enum Scan {
    /// The cursor was reached. `pending` is oldest-first and holds at most
    /// `batch_size` entries; `complete` is set when nothing was cut off.
    Reached {
        pending: Vec<SignatureInfo>,
        complete: bool,
    },
    /// The window ran out first; the oldest signature listed.
    Deeper(String),
}

/// Cursor-driven polling loop over the monitored programs.
///
/// # Example
///
/// ```no_run
/// use mevrebels_indexer::{
///     DefaultRpcProvider, EventDecoder, IngestionCoordinator, LogExtractor, MemoryStore,
///     MonitoredPrograms, Poller, PollerConfig, ProgramRole,
/// };
/// use solana_sdk::pubkey::Pubkey;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let programs = MonitoredPrograms::new(vec![(Pubkey::new_unique(), ProgramRole::DaoGovernance)])?;
/// let store = Arc::new(MemoryStore::new());
/// let extractor = LogExtractor::new(EventDecoder::new(programs.clone()));
/// let coordinator = Arc::new(IngestionCoordinator::new(extractor, store.clone()));
/// let rpc = Arc::new(DefaultRpcProvider::new("http://127.0.0.1:8899"));
///
/// let poller = Poller::new(rpc, coordinator, programs, PollerConfig::default())
///     .with_cursor_store(store);
/// let handle = poller.handle();
/// let task = tokio::spawn(poller.run());
/// handle.stop();
/// task.await?;
/// # Ok(())
/// # }
/// ```
pub struct Poller {
    rpc: Arc<dyn RpcProvider>,
    coordinator: Arc<IngestionCoordinator>,
    cursor_store: Option<Arc<dyn CursorStore>>,
    programs: MonitoredPrograms,
    config: PollerConfig,
    /// Last processed signature per program. Owned by this loop only.
    cursors: HashMap<Pubkey, String>,
    /// Per program, `before` anchors of backlog windows still to replay; the
    /// last one is the deepest.
    anchors: HashMap<Pubkey, Vec<String>>,
    backoff: FailureBackoff,
    state: Arc<AtomicU8>,
    token: CancellationToken,
}

impl Poller {
    #[must_use]
    pub fn new(
        rpc: Arc<dyn RpcProvider>,
        coordinator: Arc<IngestionCoordinator>,
        programs: MonitoredPrograms,
        config: PollerConfig,
    ) -> Self {
        let backoff = FailureBackoff::new(config.backoff.clone());
        Self {
            rpc,
            coordinator,
            cursor_store: None,
            programs,
            config,
            cursors: HashMap::new(),
            anchors: HashMap::new(),
            backoff,
            state: Arc::new(AtomicU8::new(PollerState::Idle.as_u8())),
            token: CancellationToken::new(),
        }
    }

    /// Checkpoints cursors to `store` when `persist_cursors` is set.
    #[must_use]
    pub fn with_cursor_store(mut self, store: Arc<dyn CursorStore>) -> Self {
        self.cursor_store = Some(store);
        self
    }

    /// Stops this poller when `token` is cancelled.
    #[must_use]
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    #[must_use]
    pub fn handle(&self) -> PollerHandle {
        PollerHandle {
            state: Arc::clone(&self.state),
            token: self.token.clone(),
        }
    }

    #[must_use]
    pub fn state(&self) -> PollerState {
        PollerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    #[must_use]
    pub fn cursor(&self, program_id: &Pubkey) -> Option<&str> {
        self.cursors.get(program_id).map(String::as_str)
    }

    /// Seeds the in-memory cursor, e.g. to start from a known signature.
    pub fn set_cursor(&mut self, program_id: Pubkey, signature: impl Into<String>) {
        self.anchors.remove(&program_id);
        self.cursors.insert(program_id, signature.into());
    }

    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.backoff.consecutive_failures()
    }

    fn durable_store(&self) -> Option<&Arc<dyn CursorStore>> {
        self.cursor_store
            .as_ref()
            .filter(|_| self.config.persist_cursors)
    }

    /// Loads checkpointed cursors. Returns how many programs had one.
    ///
    /// A program whose cursor cannot be read starts without one; re-scanning is
    /// safe, only slower.
    pub async fn restore_cursors(&mut self) -> usize {
        let Some(store) = self.durable_store().cloned() else {
            return 0;
        };
        let mut restored = 0;
        for program in self.programs.iter() {
            match store.load_cursor(&program.program_id).await {
                Ok(Some(signature)) => {
                    tracing::info!(
                        program_id = %program.program_id,
                        role = %program.role,
                        cursor = %signature,
                        "Restored polling cursor"
                    );
                    self.cursors.insert(program.program_id, signature);
                    restored += 1;
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(
                    program_id = %program.program_id,
                    error = %e,
                    "Failed to load polling cursor, starting from the newest page"
                ),
            }
        }
        restored
    }

    /// Runs one cycle over every monitored program.
    ///
    /// A failing program is logged and leaves its cursor untouched; the other
    /// programs are still polled.
    pub async fn poll_once(&mut self) -> CycleReport {
        let mut report = CycleReport::default();
        if self.token.is_cancelled() {
            tracing::debug!("Poller stopped, skipping cycle");
            return report;
        }
        if self
            .state
            .compare_exchange(
                PollerState::Idle.as_u8(),
                PollerState::Polling.as_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            tracing::debug!(state = %self.state(), "Poller not idle, skipping cycle");
            return report;
        }

        let programs = self.programs.clone();
        for program in programs.iter() {
            match self.poll_program(&program.program_id).await {
                Ok(pass) => {
                    report.programs_succeeded += 1;
                    report.transactions_processed += pass.transactions;
                    report.rows_written += pass.rows;
                    report.transactions_missing += pass.missing;
                    if let Some(signature) = pass.new_cursor {
                        self.advance_cursor(program.program_id, signature).await;
                    }
                    self.move_anchor(program.program_id, pass.anchor);
                }
                Err(e) => {
                    report.programs_failed += 1;
                    if is_transient(&e) {
                        tracing::warn!(
                            program_id = %program.program_id,
                            role = %program.role,
                            error = %e,
                            "Poll failed for program, will retry next cycle"
                        );
                    } else {
                        tracing::error!(
                            program_id = %program.program_id,
                            role = %program.role,
                            error = %e,
                            "Poll failed for program, will retry next cycle"
                        );
                    }
                }
            }
        }

        if report.programs_succeeded > 0 || report.programs_failed == 0 {
            self.backoff.record_success();
        } else {
            self.backoff.record_failure();
        }

        if report.transactions_processed > 0 || report.programs_failed > 0 {
            tracing::info!(
                programs_ok = report.programs_succeeded,
                programs_failed = report.programs_failed,
                transactions = report.transactions_processed,
                rows = report.rows_written,
                missing = report.transactions_missing,
                "Poll cycle complete"
            );
        }

        self.state.store(PollerState::Idle.as_u8(), Ordering::SeqCst);
        if self.token.is_cancelled() {
            let _ = self.state.compare_exchange(
                PollerState::Idle.as_u8(),
                PollerState::Stopped.as_u8(),
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
        }
        report
    }

    /// Pause before the next cycle: the poll interval, or the grown backoff
    /// once every program has failed.
    fn next_delay(&self) -> Duration {
        if self.backoff.consecutive_failures() == 0 {
            self.config.interval()
        } else {
            self.backoff.next_delay()
        }
    }

    /// Runs cycles until stopped. Cursors are restored first.
    pub async fn run(mut self) {
        let restored = self.restore_cursors().await;
        tracing::info!(
            programs = self.programs.len(),
            restored_cursors = restored,
            interval_s = self.config.interval_secs,
            "Poller started"
        );

        while !self.token.is_cancelled() {
            self.poll_once().await;

            let delay = self.next_delay();
            if self.backoff.consecutive_failures() > 0 {
                tracing::warn!(
                    consecutive_failures = self.backoff.consecutive_failures(),
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "Every program failed, backing off"
                );
            }

            tokio::select! {
                () = self.token.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        self.state
            .store(PollerState::Stopped.as_u8(), Ordering::SeqCst);
        tracing::info!("Poller stopped");
    }

    async fn advance_cursor(&mut self, program_id: Pubkey, signature: String) {
        if let Some(store) = self.durable_store() {
            if let Err(e) = store.save_cursor(&program_id, &signature).await {
                tracing::warn!(
                    program_id = %program_id,
                    cursor = %signature,
                    error = %e,
                    "Failed to checkpoint polling cursor"
                );
            }
        }
        self.cursors.insert(program_id, signature);
    }

    fn move_anchor(&mut self, program_id: Pubkey, anchor: AnchorMove) {
        match anchor {
            AnchorMove::Keep => {}
            AnchorMove::Descend(signature) => {
                self.anchors.entry(program_id).or_default().push(signature);
            }
            AnchorMove::Ascend => {
                if let Some(stack) = self.anchors.get_mut(&program_id) {
                    stack.pop();
                    if stack.is_empty() {
                        self.anchors.remove(&program_id);
                    }
                }
            }
        }
    }

    async fn poll_program(&self, program_id: &Pubkey) -> Result<ProgramPass> {
        let cursor = self.cursor(program_id);
        let anchor = self
            .anchors
            .get(program_id)
            .and_then(|stack| stack.last())
            .map(String::as_str);

        let (pending, complete) = match self.scan(program_id, anchor, cursor).await? {
            Scan::Reached { pending, complete } => (pending, complete),
            Scan::Deeper(oldest) => {
                tracing::warn!(
                    program_id = %program_id,
                    cursor = cursor.unwrap_or_default(),
                    resume_before = %oldest,
                    "Backlog exceeds scan window, resuming further back next cycle"
                );
                return Ok(ProgramPass {
                    anchor: AnchorMove::Descend(oldest),
                    ..ProgramPass::default()
                });
            }
        };

        let mut pass = ProgramPass {
            new_cursor: pending.last().map(|s| s.signature.clone()),
            anchor: if complete && anchor.is_some() {
                AnchorMove::Ascend
            } else {
                AnchorMove::Keep
            },
            ..ProgramPass::default()
        };

        for info in &pending {
            if info.failed {
                tracing::debug!(signature = %info.signature, "Skipping failed transaction");
                continue;
            }

            let Some(tx) = self.rpc.get_transaction(&info.signature).await? else {
                tracing::warn!(
                    program_id = %program_id,
                    signature = %info.signature,
                    slot = info.slot,
                    "Transaction body not available, skipping"
                );
                pass.missing += 1;
                continue;
            };

            pass.rows += self.coordinator.process_transaction(&tx).await?;
            pass.transactions += 1;
        }

        Ok(pass)
    }

    /// Lists signatures older than `anchor` and newer than `cursor`.
    ///
    /// Without a cursor only the newest page is considered. When the cursor is
    /// not reached within `max_scan_pages`, one extra single-entry listing tells
    /// whether anything lies between the window and the cursor.
    async fn scan(
        &self,
        program_id: &Pubkey,
        anchor: Option<&str>,
        cursor: Option<&str>,
    ) -> Result<Scan> {
        let page_size = self.config.page_size;
        let mut collected: Vec<SignatureInfo> = Vec::new();
        let mut before = anchor.map(str::to_string);
        let mut reached = cursor.is_none();

        for _ in 0..self.config.max_scan_pages {
            let page = self
                .rpc
                .get_signatures_for_address(program_id, before.as_deref(), cursor, page_size)
                .await?;
            let len = page.len();
            if let Some(last) = page.last() {
                before = Some(last.signature.clone());
            }
            collected.extend(page);

            if cursor.is_none() || len < page_size {
                reached = true;
                break;
            }
        }

        // `until` is exclusive, but not every node honours it.
        collected.retain(|s| Some(s.signature.as_str()) != cursor);

        if !reached {
            let beyond = self
                .rpc
                .get_signatures_for_address(program_id, before.as_deref(), cursor, 1)
                .await?;
            let gap = beyond
                .iter()
                .any(|s| Some(s.signature.as_str()) != cursor);
            if let Some(oldest) = before.filter(|_| gap) {
                return Ok(Scan::Deeper(oldest));
            }
        }

        collected.reverse();
        let complete = collected.len() <= self.config.batch_size;
        collected.truncate(self.config.batch_size);
        Ok(Scan::Reached {
            pending: collected,
            complete,
        })
    }
}
