use base64::{Engine as _, engine::general_purpose::STANDARD};
use mevrebels_indexer::{
    DecodeFailure, DecodedEvent, EventDecoder, EventKind, LogExtractor, MonitoredPrograms,
    ProfitDistributed, ProgramRole, ProposalCreated, StrategyCreated, StrategyExecuted,
    TransactionEnvelope, VoteCast, VoteDirection, calculate_discriminator,
};
use solana_sdk::pubkey::Pubkey;

struct Programs {
    registry: Pubkey,
    engine: Pubkey,
    dao: Pubkey,
    flash_loan: Pubkey,
}

fn setup() -> (EventDecoder, Programs) {
    let programs = Programs {
        registry: Pubkey::new_unique(),
        engine: Pubkey::new_unique(),
        dao: Pubkey::new_unique(),
        flash_loan: Pubkey::new_unique(),
    };
    let monitored = MonitoredPrograms::new(vec![
        (programs.registry, ProgramRole::StrategyRegistry),
        (programs.engine, ProgramRole::ExecutionEngine),
        (programs.dao, ProgramRole::DaoGovernance),
        (programs.flash_loan, ProgramRole::FlashLoan),
    ])
    .unwrap();
    (EventDecoder::new(monitored), programs)
}

/// Hand-assembled `StrategyCreated` bytes: strategy_id=7, name="abc",
/// threshold=1000, slippage=50.
fn strategy_created_bytes(creator: &Pubkey) -> Vec<u8> {
    let mut bytes = calculate_discriminator("StrategyCreated").to_vec();
    bytes.extend_from_slice(&creator.to_bytes());
    bytes.extend_from_slice(&7u64.to_le_bytes());
    bytes.extend_from_slice(&3u32.to_le_bytes());
    bytes.extend_from_slice(b"abc");
    bytes.extend_from_slice(&1000u64.to_le_bytes());
    bytes.extend_from_slice(&50u16.to_le_bytes());
    bytes
}

#[test]
fn test_discriminator_matches_event_namespace() {
    for kind in [
        EventKind::StrategyCreated,
        EventKind::StrategyExecuted,
        EventKind::ProfitDistributed,
        EventKind::ProposalCreated,
        EventKind::VoteCast,
    ] {
        assert_eq!(kind.discriminator(), calculate_discriminator(kind.as_ref()));
    }
}

#[test]
fn test_decode_hand_assembled_strategy_created() {
    let (decoder, programs) = setup();
    let creator = Pubkey::new_unique();

    let event = decoder
        .decode(&strategy_created_bytes(&creator), &programs.registry)
        .unwrap()
        .expect("registry declares StrategyCreated");

    assert_eq!(
        event,
        DecodedEvent::StrategyCreated(StrategyCreated {
            creator,
            strategy_id: 7,
            name: "abc".to_string(),
            profit_threshold: 1000,
            max_slippage: 50,
        })
    );
}

#[test]
fn test_decode_every_kind_under_its_program() {
    let (decoder, programs) = setup();
    let strategy = Pubkey::new_unique();

    let cases: Vec<(DecodedEvent, Pubkey)> = vec![
        (
            StrategyCreated {
                creator: Pubkey::new_unique(),
                strategy_id: u64::from(u32::MAX) + 1,
                name: "sandwich-🥪".to_string(),
                profit_threshold: 0,
                max_slippage: u16::MAX,
            }
            .into(),
            programs.registry,
        ),
        (
            StrategyExecuted {
                strategy,
                executor: Pubkey::new_unique(),
                profit: 123_456_789,
                gas_used: 200_000,
                success: true,
            }
            .into(),
            programs.engine,
        ),
        (
            ProfitDistributed {
                strategy,
                creator_share: 40,
                executor_share: 50,
                treasury_share: 10,
            }
            .into(),
            programs.engine,
        ),
        (
            ProposalCreated {
                proposer: Pubkey::new_unique(),
                proposal_id: 3,
                title: String::new(),
                end_time: 1_735_689_600,
            }
            .into(),
            programs.dao,
        ),
        (
            VoteCast {
                proposal: Pubkey::new_unique(),
                voter: Pubkey::new_unique(),
                vote_type: VoteDirection::Against,
                vote_weight: 42,
            }
            .into(),
            programs.dao,
        ),
    ];

    for (event, program_id) in cases {
        let decoded = decoder.decode(&event.encode(), &program_id).unwrap();
        assert_eq!(decoded.as_ref(), Some(&event), "kind {}", event.kind());
    }
}

/// Discriminator for `kind` followed by the raw field bytes.
fn payload(kind: &str, fields: &[&[u8]]) -> Vec<u8> {
    let mut bytes = calculate_discriminator(kind).to_vec();
    for field in fields {
        bytes.extend_from_slice(field);
    }
    bytes
}

#[test]
fn test_hand_assembled_bytes_reencode_identically() {
    let (decoder, programs) = setup();
    let (a, b) = (Pubkey::new_unique(), Pubkey::new_unique());
    let title = "Lower fees".as_bytes();

    let cases: Vec<(Vec<u8>, Pubkey)> = vec![
        (strategy_created_bytes(&a), programs.registry),
        (
            payload(
                "StrategyExecuted",
                &[
                    &a.to_bytes(),
                    &b.to_bytes(),
                    &987_654_321u64.to_le_bytes(),
                    &150_000u32.to_le_bytes(),
                    &[1],
                ],
            ),
            programs.engine,
        ),
        (
            payload(
                "ProfitDistributed",
                &[
                    &a.to_bytes(),
                    &400u64.to_le_bytes(),
                    &500u64.to_le_bytes(),
                    &100u64.to_le_bytes(),
                ],
            ),
            programs.engine,
        ),
        (
            payload(
                "ProposalCreated",
                &[
                    &a.to_bytes(),
                    &9u64.to_le_bytes(),
                    &(title.len() as u32).to_le_bytes(),
                    title,
                    &1_735_689_600u64.to_le_bytes(),
                ],
            ),
            programs.dao,
        ),
        (
            payload(
                "VoteCast",
                &[&a.to_bytes(), &b.to_bytes(), &[0], &42u64.to_le_bytes()],
            ),
            programs.dao,
        ),
        (
            payload(
                "VoteCast",
                &[&b.to_bytes(), &a.to_bytes(), &[1], &u64::MAX.to_le_bytes()],
            ),
            programs.dao,
        ),
    ];

    for (bytes, program_id) in cases {
        let decoded = decoder
            .decode(&bytes, &program_id)
            .unwrap()
            .expect("program declares this kind");
        assert_eq!(decoded.encode(), bytes, "kind {}", decoded.kind());
    }
}

#[test]
fn test_role_gates_kinds() {
    let (decoder, programs) = setup();
    let payload = strategy_created_bytes(&Pubkey::new_unique());

    assert!(decoder.decode(&payload, &programs.registry).unwrap().is_some());
    assert_eq!(decoder.decode(&payload, &programs.engine), Ok(None));
    assert_eq!(decoder.decode(&payload, &programs.dao), Ok(None));
    assert_eq!(decoder.decode(&payload, &programs.flash_loan), Ok(None));
    assert_eq!(decoder.decode(&payload, &Pubkey::new_unique()), Ok(None));
}

#[test]
fn test_unknown_discriminator_and_short_input() {
    let (decoder, programs) = setup();

    let mut unknown = calculate_discriminator("LiquidationTriggered").to_vec();
    unknown.extend_from_slice(&[0u8; 64]);
    assert_eq!(decoder.decode(&unknown, &programs.engine), Ok(None));

    assert_eq!(decoder.decode(&[], &programs.registry), Ok(None));
    let tag = EventKind::StrategyCreated.discriminator();
    assert_eq!(decoder.decode(&tag[..7], &programs.registry), Ok(None));
}

#[test]
fn test_bool_only_one_is_true() {
    let (decoder, programs) = setup();
    let executed = StrategyExecuted {
        strategy: Pubkey::new_unique(),
        executor: Pubkey::new_unique(),
        profit: 1,
        gas_used: 1,
        success: true,
    };
    let mut bytes = DecodedEvent::from(executed).encode();
    let last = bytes.len() - 1;

    for (byte, expected) in [(0u8, false), (1, true), (2, false), (255, false)] {
        bytes[last] = byte;
        match decoder.decode(&bytes, &programs.engine).unwrap() {
            Some(DecodedEvent::StrategyExecuted(e)) => assert_eq!(e.success, expected, "byte {byte}"),
            other => panic!("unexpected decode result: {other:?}"),
        }
    }
}

#[test]
fn test_truncated_body_reports_kind_and_offset() {
    let (decoder, programs) = setup();
    let bytes = strategy_created_bytes(&Pubkey::new_unique());

    // Cut inside the trailing u16: 8 + 32 + 8 + 4 + 3 + 8 = 63.
    let err = decoder
        .decode(&bytes[..64], &programs.registry)
        .unwrap_err();
    assert_eq!(err.kind, EventKind::StrategyCreated);
    assert_eq!(err.offset, 63);
    assert!(matches!(err.reason, DecodeFailure::Truncated { .. }));
}

#[test]
fn test_string_length_overrun_is_an_error() {
    let (decoder, programs) = setup();
    let mut bytes = calculate_discriminator("ProposalCreated").to_vec();
    bytes.extend_from_slice(&Pubkey::new_unique().to_bytes());
    bytes.extend_from_slice(&1u64.to_le_bytes());
    bytes.extend_from_slice(&1_000u32.to_le_bytes());
    bytes.extend_from_slice(b"short");

    let err = decoder.decode(&bytes, &programs.dao).unwrap_err();
    assert_eq!(err.kind, EventKind::ProposalCreated);
    assert!(matches!(err.reason, DecodeFailure::LengthOverrun { declared: 1_000, .. }));
}

#[test]
fn test_invalid_vote_direction_is_an_error() {
    let (decoder, programs) = setup();
    let vote = VoteCast {
        proposal: Pubkey::new_unique(),
        voter: Pubkey::new_unique(),
        vote_type: VoteDirection::For,
        vote_weight: 5,
    };
    let mut bytes = DecodedEvent::from(vote).encode();
    bytes[8 + 64] = 2;

    let err = decoder.decode(&bytes, &programs.dao).unwrap_err();
    assert!(matches!(
        err.reason,
        DecodeFailure::InvalidEnum { value: 2, .. }
    ));
}

#[test]
fn test_trailing_bytes_are_ignored() {
    let (decoder, programs) = setup();
    let mut bytes = strategy_created_bytes(&Pubkey::new_unique());
    bytes.extend_from_slice(&[0xAB; 16]);
    assert!(decoder.decode(&bytes, &programs.registry).unwrap().is_some());
}

#[test]
fn test_extract_attributes_payload_to_innermost_program() {
    let (decoder, programs) = setup();
    let extractor = LogExtractor::new(decoder);
    let payload = STANDARD.encode(strategy_created_bytes(&Pubkey::new_unique()));
    let outsider = Pubkey::new_unique();

    let tx = TransactionEnvelope::with_logs(
        "SIG-CPI",
        10,
        vec![
            format!("Program {} invoke [1]", programs.engine),
            format!("Program {} invoke [2]", programs.registry),
            format!("Program data: {payload}"),
            format!("Program {} success", programs.registry),
            // Same payload under the engine: not a declared kind, ignored.
            format!("Program data: {payload}"),
            format!("Program {outsider} invoke [2]"),
            format!("Program data: {payload}"),
            format!("Program {outsider} success"),
            format!("Program {} success", programs.engine),
        ],
    );

    let extraction = extractor.extract(&tx);
    assert_eq!(extraction.events.len(), 1);
    assert_eq!(extraction.events[0].program_id, programs.registry);
    assert_eq!(extraction.events[0].slot, 10);
    assert_eq!(extraction.rejected, 0);
}
