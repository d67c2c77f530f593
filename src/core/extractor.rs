//! Log extractor: finds `Program data:` payloads in a transaction's logs and
//! decodes them under the program that emitted them.

use crate::core::decoder::EventDecoder;
use crate::types::transaction::{EnrichedEvent, TransactionEnvelope};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use solana_sdk::pubkey::Pubkey;

/// Marker prefix of an event payload line.
pub const PROGRAM_DATA_PREFIX: &str = "Program data: ";

/// Result of scanning one transaction.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Decoded events in log order.
    pub events: Vec<EnrichedEvent>,
    /// Payloads dropped for bad base64 or a malformed body.
    pub rejected: usize,
}

/// Scans transaction logs and hands each payload to the [`EventDecoder`].
#[derive(Debug, Clone)]
pub struct LogExtractor {
    decoder: EventDecoder,
}

impl LogExtractor {
    #[must_use]
    pub fn new(decoder: EventDecoder) -> Self {
        Self { decoder }
    }

    #[must_use]
    pub fn decoder(&self) -> &EventDecoder {
        &self.decoder
    }

    /// Extracts every decodable event from `tx`, in log order.
    ///
    /// Transactions without log metadata, and transactions that failed
    /// on-chain, yield nothing. A payload is attributed to the innermost
    /// invoked program; when the logs carry no invocation lines it is tried
    /// once under each monitored program until one decodes it.
    #[must_use]
    pub fn extract(&self, tx: &TransactionEnvelope) -> Extraction {
        let mut out = Extraction::default();

        let Some(logs) = tx.log_messages() else {
            return out;
        };
        if tx.failed() {
            tracing::debug!(
                signature = %tx.signature,
                "Skipping failed transaction, its events were rolled back"
            );
            return out;
        }

        let mut program_stack: Vec<Pubkey> = Vec::new();

        for (line_no, log) in logs.iter().enumerate() {
            if log.contains(" invoke [") {
                if let Some(program_id) = program_id_of(log) {
                    program_stack.push(program_id);
                }
                continue;
            }

            if log.contains(" success") || log.contains(" failed") {
                if program_id_of(log).is_some() {
                    program_stack.pop();
                }
                continue;
            }

            let Some(encoded) = log.strip_prefix(PROGRAM_DATA_PREFIX) else {
                continue;
            };

            let payload = match STANDARD.decode(encoded.trim()) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(
                        signature = %tx.signature,
                        line = line_no,
                        error = %e,
                        "Skipping malformed base64 payload"
                    );
                    out.rejected += 1;
                    continue;
                }
            };

            match program_stack.last() {
                Some(program_id) if self.decoder.programs().contains(program_id) => {
                    self.decode_into(&mut out, tx, &payload, program_id, line_no);
                }
                Some(program_id) => {
                    tracing::trace!(
                        signature = %tx.signature,
                        program_id = %program_id,
                        "Ignoring payload from unmonitored program"
                    );
                }
                None => {
                    for program in self.decoder.programs().iter() {
                        if self.decode_into(&mut out, tx, &payload, &program.program_id, line_no) {
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Decodes one (payload, program) pair. Returns `true` once the payload is
    /// settled: decoded, or rejected as malformed.
    fn decode_into(
        &self,
        out: &mut Extraction,
        tx: &TransactionEnvelope,
        payload: &[u8],
        program_id: &Pubkey,
        line_no: usize,
    ) -> bool {
        match self.decoder.decode(payload, program_id) {
            Ok(Some(event)) => {
                out.events.push(EnrichedEvent {
                    event,
                    program_id: *program_id,
                    signature: tx.signature.clone(),
                    slot: tx.slot,
                    block_time: tx.block_time,
                });
                true
            }
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(
                    signature = %tx.signature,
                    program_id = %program_id,
                    kind = %e.kind,
                    offset = e.offset,
                    line = line_no,
                    error = %e.reason,
                    "Skipping malformed event payload"
                );
                out.rejected += 1;
                true
            }
        }
    }
}

/// Program id from an `invoke`/`success`/`failed` line: `Program <id> ...`.
fn program_id_of(log: &str) -> Option<Pubkey> {
    let mut parts = log.split_whitespace();
    if parts.next()? != "Program" {
        return None;
    }
    parts.next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitoredPrograms;
    use crate::types::events::{DecodedEvent, ProgramRole, StrategyCreated};

    fn extractor() -> (LogExtractor, Pubkey) {
        let registry = Pubkey::new_unique();
        let programs = MonitoredPrograms::new(vec![
            (registry, ProgramRole::StrategyRegistry),
            (Pubkey::new_unique(), ProgramRole::ExecutionEngine),
        ])
        .unwrap();
        (LogExtractor::new(EventDecoder::new(programs)), registry)
    }

    fn strategy_line(strategy_id: u64) -> String {
        let event = DecodedEvent::from(StrategyCreated {
            creator: Pubkey::new_from_array([3; 32]),
            strategy_id,
            name: "abc".to_string(),
            profit_threshold: 1000,
            max_slippage: 50,
        });
        format!("{PROGRAM_DATA_PREFIX}{}", STANDARD.encode(event.encode()))
    }

    #[test]
    fn test_no_meta_yields_nothing() {
        let (extractor, _) = extractor();
        let tx = TransactionEnvelope {
            signature: "S".into(),
            slot: 1,
            block_time: None,
            meta: None,
        };
        assert_eq!(extractor.extract(&tx), Extraction::default());
    }

    #[test]
    fn test_bare_payload_attaches_provenance() {
        let (extractor, registry) = extractor();
        let mut tx = TransactionEnvelope::with_logs("SIG42", 77, vec![strategy_line(7)]);
        tx.block_time = Some(1_700_000_000);

        let out = extractor.extract(&tx);
        assert_eq!(out.events.len(), 1);
        let event = &out.events[0];
        assert_eq!(event.signature, "SIG42");
        assert_eq!(event.slot, 77);
        assert_eq!(event.block_time, Some(1_700_000_000));
        assert_eq!(event.program_id, registry);
    }

    #[test]
    fn test_bad_base64_is_skipped_and_counted() {
        let (extractor, _) = extractor();
        let tx = TransactionEnvelope::with_logs(
            "S",
            1,
            vec![
                "Program data: !!!not-base64!!!".to_string(),
                strategy_line(1),
                "Program log: Instruction: Create".to_string(),
            ],
        );
        let out = extractor.extract(&tx);
        assert_eq!(out.events.len(), 1);
        assert_eq!(out.rejected, 1);
    }

    #[test]
    fn test_invoke_stack_attribution() {
        let (extractor, registry) = extractor();
        let other = Pubkey::new_unique();
        let tx = TransactionEnvelope::with_logs(
            "S",
            1,
            vec![
                format!("Program {registry} invoke [1]"),
                format!("Program {other} invoke [2]"),
                strategy_line(1),
                format!("Program {other} success"),
                strategy_line(2),
                format!("Program {registry} success"),
            ],
        );
        let out = extractor.extract(&tx);
        assert_eq!(out.events.len(), 1);
        match &out.events[0].event {
            DecodedEvent::StrategyCreated(e) => assert_eq!(e.strategy_id, 2),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_failed_transaction_yields_nothing() {
        let (extractor, _) = extractor();
        let mut tx = TransactionEnvelope::with_logs("S", 1, vec![strategy_line(1)]);
        if let Some(meta) = tx.meta.as_mut() {
            meta.err = Some(serde_json::json!({"InstructionError": [0, {"Custom": 1}]}));
        }
        assert!(extractor.extract(&tx).events.is_empty());
    }

    #[test]
    fn test_program_id_of() {
        let id = Pubkey::new_unique();
        assert_eq!(program_id_of(&format!("Program {id} invoke [1]")), Some(id));
        assert_eq!(program_id_of(&format!("Program {id} failed: custom")), Some(id));
        assert_eq!(program_id_of("Program log: hello"), None);
    }
}
