//! Binary event decoder.
//!
//! Turns one `Program data:` payload into at most one typed event. Dispatch is
//! a precomputed table from 8-byte discriminator to decode function, built once
//! from the fixed list of kind names. Decoding is pure: identical bytes and
//! program always yield identical output.

use crate::config::MonitoredPrograms;
use crate::types::events::{
    DecodedEvent, EventKind, ProfitDistributed, ProposalCreated, StrategyCreated,
    StrategyExecuted, VoteCast, VoteDirection,
};
use crate::utils::error::{DecodeError, DecodeFailure};
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use strum::IntoEnumIterator;

/// Length of the leading kind tag.
pub const DISCRIMINATOR_LEN: usize = 8;

type FieldResult<T> = std::result::Result<T, DecodeFailure>;
type DecodeFn = fn(&mut ByteReader<'_>) -> FieldResult<DecodedEvent>;

/// Sequential little-endian reader over a payload.
///
/// A failed read leaves the offset at the start of the field that failed.
#[derive(Debug)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    /// Starts reading at `offset`, keeping offsets relative to the full buffer.
    #[must_use]
    pub fn at(buf: &'a [u8], offset: usize) -> Self {
        Self { buf, offset }
    }

    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.offset)
    }

    fn take(&mut self, needed: usize) -> FieldResult<&'a [u8]> {
        let remaining = self.remaining();
        if needed > remaining {
            return Err(DecodeFailure::Truncated { needed, remaining });
        }
        let bytes = &self.buf[self.offset..self.offset + needed];
        self.offset += needed;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> FieldResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> FieldResult<u8> {
        Ok(self.array::<1>()?[0])
    }

    pub fn u16(&mut self) -> FieldResult<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub fn u32(&mut self) -> FieldResult<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn u64(&mut self) -> FieldResult<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    /// Only `1` is true; every other byte value is false.
    pub fn bool(&mut self) -> FieldResult<bool> {
        Ok(self.u8()? == 1)
    }

    pub fn pubkey(&mut self) -> FieldResult<Pubkey> {
        Ok(Pubkey::new_from_array(self.array()?))
    }

    /// `u32` little-endian length prefix followed by that many UTF-8 bytes.
    pub fn string(&mut self) -> FieldResult<String> {
        let declared = self.u32()? as usize;
        let remaining = self.remaining();
        if declared > remaining {
            return Err(DecodeFailure::LengthOverrun {
                declared,
                remaining,
            });
        }
        let bytes = self.take(declared)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| {
            self.offset -= declared;
            DecodeFailure::InvalidUtf8
        })
    }

    pub fn vote_direction(&mut self) -> FieldResult<VoteDirection> {
        let value = self.u8()?;
        VoteDirection::from_byte(value).ok_or_else(|| {
            self.offset -= 1;
            DecodeFailure::InvalidEnum {
                field: "vote_type",
                value,
            }
        })
    }
}

fn decode_strategy_created(r: &mut ByteReader<'_>) -> FieldResult<DecodedEvent> {
    Ok(StrategyCreated {
        creator: r.pubkey()?,
        strategy_id: r.u64()?,
        name: r.string()?,
        profit_threshold: r.u64()?,
        max_slippage: r.u16()?,
    }
    .into())
}

fn decode_strategy_executed(r: &mut ByteReader<'_>) -> FieldResult<DecodedEvent> {
    Ok(StrategyExecuted {
        strategy: r.pubkey()?,
        executor: r.pubkey()?,
        profit: r.u64()?,
        gas_used: r.u32()?,
        success: r.bool()?,
    }
    .into())
}

fn decode_profit_distributed(r: &mut ByteReader<'_>) -> FieldResult<DecodedEvent> {
    Ok(ProfitDistributed {
        strategy: r.pubkey()?,
        creator_share: r.u64()?,
        executor_share: r.u64()?,
        treasury_share: r.u64()?,
    }
    .into())
}

fn decode_proposal_created(r: &mut ByteReader<'_>) -> FieldResult<DecodedEvent> {
    Ok(ProposalCreated {
        proposer: r.pubkey()?,
        proposal_id: r.u64()?,
        title: r.string()?,
        end_time: r.u64()?,
    }
    .into())
}

fn decode_vote_cast(r: &mut ByteReader<'_>) -> FieldResult<DecodedEvent> {
    Ok(VoteCast {
        proposal: r.pubkey()?,
        voter: r.pubkey()?,
        vote_type: r.vote_direction()?,
        vote_weight: r.u64()?,
    }
    .into())
}

fn layout_for(kind: EventKind) -> DecodeFn {
    match kind {
        EventKind::StrategyCreated => decode_strategy_created,
        EventKind::StrategyExecuted => decode_strategy_executed,
        EventKind::ProfitDistributed => decode_profit_distributed,
        EventKind::ProposalCreated => decode_proposal_created,
        EventKind::VoteCast => decode_vote_cast,
    }
}

/// Discriminator-dispatched decoder, scoped to the monitored programs.
///
/// # Example
///
/// ```
/// use mevrebels_indexer::{EventDecoder, MonitoredPrograms, ProgramRole};
/// use solana_sdk::pubkey::Pubkey;
///
/// let registry = Pubkey::new_unique();
/// let programs = MonitoredPrograms::new(vec![(registry, ProgramRole::StrategyRegistry)]).unwrap();
/// let decoder = EventDecoder::new(programs);
///
/// assert_eq!(decoder.decode(&[1, 2, 3], &registry), Ok(None));
/// ```
#[derive(Debug, Clone)]
pub struct EventDecoder {
    table: HashMap<[u8; DISCRIMINATOR_LEN], (EventKind, DecodeFn)>,
    programs: MonitoredPrograms,
}

impl EventDecoder {
    #[must_use]
    pub fn new(programs: MonitoredPrograms) -> Self {
        let table = EventKind::iter()
            .map(|kind| (kind.discriminator(), (kind, layout_for(kind))))
            .collect();
        Self { table, programs }
    }

    #[must_use]
    pub fn programs(&self) -> &MonitoredPrograms {
        &self.programs
    }

    /// Decodes `payload` as emitted by `program_id`.
    ///
    /// Returns `Ok(None)` for payloads shorter than a discriminator, unknown
    /// discriminators, unmonitored programs, and kinds the program does not
    /// declare. Bytes after a complete layout are ignored.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] carrying the kind and byte offset when the
    /// discriminator matched but the body is malformed.
    pub fn decode(
        &self,
        payload: &[u8],
        program_id: &Pubkey,
    ) -> std::result::Result<Option<DecodedEvent>, DecodeError> {
        let Some(role) = self.programs.role_of(program_id) else {
            return Ok(None);
        };
        let Some((kind, decode_fn)) = self.lookup(payload) else {
            return Ok(None);
        };
        if !role.declares(kind) {
            return Ok(None);
        }

        let mut reader = ByteReader::at(payload, DISCRIMINATOR_LEN);
        decode_fn(&mut reader)
            .map(Some)
            .map_err(|reason| DecodeError {
                kind,
                offset: reader.offset(),
                reason,
            })
    }

    fn lookup(&self, payload: &[u8]) -> Option<(EventKind, DecodeFn)> {
        let tag: [u8; DISCRIMINATOR_LEN] = payload.get(..DISCRIMINATOR_LEN)?.try_into().ok()?;
        self.table.get(&tag).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::events::ProgramRole;

    fn fixture() -> (EventDecoder, Pubkey, Pubkey, Pubkey) {
        let registry = Pubkey::new_unique();
        let engine = Pubkey::new_unique();
        let dao = Pubkey::new_unique();
        let programs = MonitoredPrograms::new(vec![
            (registry, ProgramRole::StrategyRegistry),
            (engine, ProgramRole::ExecutionEngine),
            (dao, ProgramRole::DaoGovernance),
            (Pubkey::new_unique(), ProgramRole::FlashLoan),
        ])
        .unwrap();
        (EventDecoder::new(programs), registry, engine, dao)
    }

    fn executed(success_byte: u8) -> Vec<u8> {
        let mut bytes = EventKind::StrategyExecuted.discriminator().to_vec();
        bytes.extend_from_slice(&[7u8; 32]);
        bytes.extend_from_slice(&[9u8; 32]);
        bytes.extend_from_slice(&500u64.to_le_bytes());
        bytes.extend_from_slice(&21_000u32.to_le_bytes());
        bytes.push(success_byte);
        bytes
    }

    #[test]
    fn test_short_input_is_not_an_event() {
        let (decoder, registry, engine, dao) = fixture();
        let tag = EventKind::StrategyCreated.discriminator();
        for len in 0..DISCRIMINATOR_LEN {
            for program in [registry, engine, dao] {
                assert_eq!(decoder.decode(&tag[..len], &program), Ok(None));
            }
        }
    }

    #[test]
    fn test_unknown_discriminator_is_not_an_event() {
        let (decoder, registry, ..) = fixture();
        let payload = [0xAAu8; 64];
        assert_eq!(decoder.decode(&payload, &registry), Ok(None));
    }

    #[test]
    fn test_bool_only_one_is_true() {
        let (decoder, _, engine, _) = fixture();
        for (byte, expected) in [(0u8, false), (1, true), (2, false), (255, false)] {
            let Some(DecodedEvent::StrategyExecuted(event)) =
                decoder.decode(&executed(byte), &engine).unwrap()
            else {
                panic!("expected StrategyExecuted for byte {byte}");
            };
            assert_eq!(event.success, expected, "byte {byte}");
            assert_eq!(event.gas_used, 21_000);
        }
    }

    #[test]
    fn test_kind_gated_by_program_role() {
        let (decoder, registry, engine, _) = fixture();
        let payload = executed(1);
        assert_eq!(decoder.decode(&payload, &registry), Ok(None));
        assert_eq!(decoder.decode(&payload, &Pubkey::new_unique()), Ok(None));
        assert!(decoder.decode(&payload, &engine).unwrap().is_some());
    }

    #[test]
    fn test_truncated_field_reports_offset() {
        let (decoder, _, engine, _) = fixture();
        let payload = &executed(1)[..8 + 32 + 10];
        let err = decoder.decode(payload, &engine).unwrap_err();
        assert_eq!(err.kind, EventKind::StrategyExecuted);
        assert_eq!(err.offset, 40);
        assert!(matches!(err.reason, DecodeFailure::Truncated { needed: 32, remaining: 10 }));
    }

    #[test]
    fn test_string_length_overrun() {
        let (decoder, registry, ..) = fixture();
        let mut payload = EventKind::StrategyCreated.discriminator().to_vec();
        payload.extend_from_slice(&[1u8; 32]);
        payload.extend_from_slice(&7u64.to_le_bytes());
        payload.extend_from_slice(&u32::MAX.to_le_bytes());
        payload.extend_from_slice(b"abc");

        let err = decoder.decode(&payload, &registry).unwrap_err();
        assert_eq!(err.offset, 52);
        assert_eq!(
            err.reason,
            DecodeFailure::LengthOverrun {
                declared: u32::MAX as usize,
                remaining: 3
            }
        );
    }

    #[test]
    fn test_invalid_utf8() {
        let (decoder, _, _, dao) = fixture();
        let mut payload = EventKind::ProposalCreated.discriminator().to_vec();
        payload.extend_from_slice(&[1u8; 32]);
        payload.extend_from_slice(&1u64.to_le_bytes());
        payload.extend_from_slice(&2u32.to_le_bytes());
        payload.extend_from_slice(&[0xC3, 0x28]);
        payload.extend_from_slice(&0u64.to_le_bytes());

        let err = decoder.decode(&payload, &dao).unwrap_err();
        assert_eq!(err.reason, DecodeFailure::InvalidUtf8);
        assert_eq!(err.offset, 52);
    }

    #[test]
    fn test_unlisted_vote_direction_is_error() {
        let (decoder, _, _, dao) = fixture();
        let mut payload = EventKind::VoteCast.discriminator().to_vec();
        payload.extend_from_slice(&[1u8; 32]);
        payload.extend_from_slice(&[2u8; 32]);
        payload.push(2);
        payload.extend_from_slice(&10u64.to_le_bytes());

        let err = decoder.decode(&payload, &dao).unwrap_err();
        assert_eq!(err.offset, 72);
        assert_eq!(
            err.reason,
            DecodeFailure::InvalidEnum {
                field: "vote_type",
                value: 2
            }
        );
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let (decoder, _, engine, _) = fixture();
        let mut payload = executed(1);
        payload.extend_from_slice(&[0u8; 16]);
        assert!(decoder.decode(&payload, &engine).unwrap().is_some());
    }
}
