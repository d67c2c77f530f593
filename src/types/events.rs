//! Event types emitted by the monitored programs.
//!
//! Every event is tagged on-chain by an 8-byte discriminator derived from its
//! kind name (see [`calculate_discriminator`]) followed by a Borsh body. The
//! structs here double as the canonical encoders for those bodies, which keeps
//! fixtures and benchmarks byte-exact with what the programs log.

use borsh::BorshSerialize;
use sha2::{Digest, Sha256};
use solana_sdk::pubkey::Pubkey;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Calculates the 8-byte discriminator for an event type.
///
/// The discriminator is the first 8 bytes of the SHA256 hash of the
/// event name prefixed with "event:". This matches Anchor's event
/// discriminator calculation.
///
/// # Example
///
/// ```
/// use mevrebels_indexer::calculate_discriminator;
///
/// let discriminator = calculate_discriminator("StrategyCreated");
/// assert_eq!(discriminator.len(), 8);
/// ```
#[must_use]
pub fn calculate_discriminator(event_name: &str) -> [u8; 8] {
    let preimage = format!("event:{event_name}");
    let hash = Sha256::digest(preimage.as_bytes());
    let mut discriminator = [0u8; 8];
    discriminator.copy_from_slice(&hash[..8]);
    discriminator
}

/// The closed set of event kinds the indexer understands.
///
/// The `Display` form is the on-chain kind name and therefore the
/// discriminator preimage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, AsRefStr)]
pub enum EventKind {
    StrategyCreated,
    StrategyExecuted,
    ProfitDistributed,
    ProposalCreated,
    VoteCast,
}

impl EventKind {
    /// Discriminator for this kind.
    #[must_use]
    pub fn discriminator(self) -> [u8; 8] {
        calculate_discriminator(self.as_ref())
    }
}

/// What a monitored program is, and therefore which events it may emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ProgramRole {
    StrategyRegistry,
    ExecutionEngine,
    DaoGovernance,
    FlashLoan,
}

impl ProgramRole {
    /// Event kinds this program declares in its interface.
    #[must_use]
    pub fn declared_kinds(self) -> &'static [EventKind] {
        match self {
            Self::StrategyRegistry => &[EventKind::StrategyCreated],
            Self::ExecutionEngine => &[EventKind::StrategyExecuted, EventKind::ProfitDistributed],
            Self::DaoGovernance => &[EventKind::ProposalCreated, EventKind::VoteCast],
            Self::FlashLoan => &[],
        }
    }

    #[must_use]
    pub fn declares(self, kind: EventKind) -> bool {
        self.declared_kinds().contains(&kind)
    }
}

/// A strategy was registered.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize)]
pub struct StrategyCreated {
    pub creator: Pubkey,
    pub strategy_id: u64,
    pub name: String,
    pub profit_threshold: u64,
    /// Basis points.
    pub max_slippage: u16,
}

/// A strategy was executed by a searcher.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize)]
pub struct StrategyExecuted {
    pub strategy: Pubkey,
    pub executor: Pubkey,
    pub profit: u64,
    pub gas_used: u32,
    pub success: bool,
}

/// Profit from an execution was split between creator, executor and treasury.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize)]
pub struct ProfitDistributed {
    pub strategy: Pubkey,
    pub creator_share: u64,
    pub executor_share: u64,
    pub treasury_share: u64,
}

/// A governance proposal was opened.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize)]
pub struct ProposalCreated {
    pub proposer: Pubkey,
    pub proposal_id: u64,
    pub title: String,
    /// Unix seconds.
    pub end_time: u64,
}

/// Direction of a governance vote. Encoded as one byte: `0` against, `1` for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, BorshSerialize, Display, EnumString, AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum VoteDirection {
    Against,
    For,
}

impl VoteDirection {
    /// Maps the on-chain byte; unlisted values yield `None`.
    #[must_use]
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Against),
            1 => Some(Self::For),
            _ => None,
        }
    }
}

/// A vote was cast on a proposal.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize)]
pub struct VoteCast {
    pub proposal: Pubkey,
    pub voter: Pubkey,
    pub vote_type: VoteDirection,
    pub vote_weight: u64,
}

/// A decoded event: exactly one of the known kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedEvent {
    StrategyCreated(StrategyCreated),
    StrategyExecuted(StrategyExecuted),
    ProfitDistributed(ProfitDistributed),
    ProposalCreated(ProposalCreated),
    VoteCast(VoteCast),
}

impl DecodedEvent {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::StrategyCreated(_) => EventKind::StrategyCreated,
            Self::StrategyExecuted(_) => EventKind::StrategyExecuted,
            Self::ProfitDistributed(_) => EventKind::ProfitDistributed,
            Self::ProposalCreated(_) => EventKind::ProposalCreated,
            Self::VoteCast(_) => EventKind::VoteCast,
        }
    }

    /// Encodes the event exactly as a program logs it: discriminator then body.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = self.kind().discriminator().to_vec();
        let body = match self {
            Self::StrategyCreated(e) => borsh::to_vec(e),
            Self::StrategyExecuted(e) => borsh::to_vec(e),
            Self::ProfitDistributed(e) => borsh::to_vec(e),
            Self::ProposalCreated(e) => borsh::to_vec(e),
            Self::VoteCast(e) => borsh::to_vec(e),
        };
        // Serializing into a Vec cannot fail for these plain structs.
        out.extend(body.unwrap_or_default());
        out
    }
}

macro_rules! impl_from_event {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for DecodedEvent {
                fn from(event: $variant) -> Self {
                    Self::$variant(event)
                }
            }
        )*
    };
}

impl_from_event!(
    StrategyCreated,
    StrategyExecuted,
    ProfitDistributed,
    ProposalCreated,
    VoteCast,
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use strum::IntoEnumIterator;

    #[test]
    fn test_discriminators_are_distinct() {
        let tags: HashSet<[u8; 8]> = EventKind::iter().map(EventKind::discriminator).collect();
        assert_eq!(tags.len(), 5);
    }

    #[test]
    fn test_discriminator_matches_anchor_preimage() {
        let expected = Sha256::digest(b"event:VoteCast");
        assert_eq!(EventKind::VoteCast.discriminator(), expected[..8]);
        assert_eq!(
            calculate_discriminator("VoteCast"),
            EventKind::VoteCast.discriminator()
        );
    }

    #[test]
    fn test_program_roles_declare_disjoint_kinds() {
        let mut seen = HashSet::new();
        for role in ProgramRole::iter() {
            for kind in role.declared_kinds() {
                assert!(seen.insert(*kind), "{kind} declared twice");
            }
        }
        assert_eq!(seen.len(), 5);
        assert!(ProgramRole::FlashLoan.declared_kinds().is_empty());
    }

    #[test]
    fn test_encode_layout_strategy_created() {
        let creator = Pubkey::new_unique();
        let event = DecodedEvent::from(StrategyCreated {
            creator,
            strategy_id: 7,
            name: "abc".to_string(),
            profit_threshold: 1000,
            max_slippage: 50,
        });
        let bytes = event.encode();

        assert_eq!(bytes.len(), 8 + 32 + 8 + 4 + 3 + 8 + 2);
        assert_eq!(&bytes[..8], &EventKind::StrategyCreated.discriminator());
        assert_eq!(&bytes[8..40], &creator.to_bytes());
        assert_eq!(&bytes[40..48], &7u64.to_le_bytes());
        assert_eq!(&bytes[48..52], &3u32.to_le_bytes());
        assert_eq!(&bytes[52..55], b"abc");
        assert_eq!(&bytes[55..63], &1000u64.to_le_bytes());
        assert_eq!(&bytes[63..65], &50u16.to_le_bytes());
    }

    #[test]
    fn test_vote_direction_byte_table() {
        assert_eq!(VoteDirection::from_byte(0), Some(VoteDirection::Against));
        assert_eq!(VoteDirection::from_byte(1), Some(VoteDirection::For));
        assert_eq!(VoteDirection::from_byte(2), None);
        assert_eq!(VoteDirection::For.to_string(), "for");
        assert_eq!(borsh::to_vec(&VoteDirection::For).unwrap(), vec![1]);
    }
}
