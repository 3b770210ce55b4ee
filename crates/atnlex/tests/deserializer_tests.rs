//! Tests for serialized ATN decoding: round-trips, format rejection, and
//! structural verification.

use atnlex::atn::{AtnDeserializer, AtnStateKind, DeserializeOptions, GrammarType, Transition};
use atnlex::error::DeserializeError;
use atnlex::lexer::HIDDEN_CHANNEL;
use atnlex::testing::AtnBuilder;

fn sample_grammar() -> AtnBuilder {
    // ID: [a-zA-Z]+ ; COMMENT: '/*' .*? '*/' -> channel(HIDDEN) ;
    let mut b = AtnBuilder::lexer(2);
    let mode = b.token_start();
    let letters = b.set(&[('A' as i32, 'Z' as i32), ('a' as i32, 'z' as i32)]);
    let id = b.char_class_plus_rule(0, 1, letters);
    b.finish(id);

    let comment_start = b.rule_start(1);
    let comment_stop = b.rule_stop(1);
    b.rule(comment_start, 2);
    let s0 = b.basic(1);
    let s1 = b.basic(1);
    let s2 = b.basic(1);
    b.epsilon(comment_start, s0);
    b.atom(s0, s1, '/');
    b.atom(s1, s2, '*');
    let (entry, exit) = b.non_greedy_star_segment(1);
    b.epsilon(s2, entry);
    let c0 = b.basic(1);
    let c1 = b.basic(1);
    let c2 = b.basic(1);
    b.epsilon(exit, c0);
    b.atom(c0, c1, '*');
    b.atom(c1, c2, '/');
    let hidden = b.channel_action(HIDDEN_CHANNEL);
    b.action_edge(c2, comment_stop, 1, hidden);

    b.epsilon(mode, id.start);
    b.epsilon(mode, comment_start);
    b
}

#[test]
fn test_deserialize_twice_yields_equal_graphs() {
    let payload = sample_grammar().serialize();
    let deserializer = AtnDeserializer::default();
    let first = deserializer.deserialize(&payload).expect("payload");
    let second = deserializer.deserialize(&payload).expect("payload");
    assert_eq!(first, second);
}

#[test]
fn test_decoded_structure() {
    let payload = sample_grammar().serialize();
    let atn = AtnDeserializer::default().deserialize(&payload).expect("payload");

    assert_eq!(atn.grammar_type, GrammarType::Lexer);
    assert_eq!(atn.max_token_type, 2);
    assert_eq!(atn.rule_count(), 2);
    assert_eq!(atn.mode_count(), 1);
    assert_eq!(atn.rule_to_token_type, vec![1, 2]);

    // Mode entry is a token-start decision over both rules.
    let mode_start = atn.state(atn.mode_to_start_state[0]);
    assert!(matches!(mode_start.kind, AtnStateKind::TokenStart));
    assert!(mode_start.kind.is_decision());
    assert_eq!(mode_start.transitions.len(), 2);

    // Rule starts learned their stop states.
    for rule in 0..atn.rule_count() {
        let start = atn.state(atn.rule_to_start_state[rule]);
        let AtnStateKind::RuleStart { stop_state, .. } = &start.kind else {
            panic!("rule {rule} start state has wrong kind");
        };
        assert_eq!(*stop_state, Some(atn.rule_to_stop_state[rule]));
    }

    // The non-greedy loop survived with its flag and back-links.
    let entry = atn
        .states
        .iter()
        .find(|s| matches!(s.kind, AtnStateKind::StarLoopEntry { .. }))
        .expect("star loop entry");
    assert!(entry.non_greedy);
    let AtnStateKind::StarLoopEntry { loop_back, .. } = &entry.kind else {
        unreachable!()
    };
    assert!(loop_back.is_some());

    // The channel action decoded into the action table.
    assert_eq!(atn.lexer_actions.len(), 1);
}

#[test]
fn test_set_transition_contents() {
    let payload = sample_grammar().serialize();
    let atn = AtnDeserializer::default().deserialize(&payload).expect("payload");
    let set = atn
        .states
        .iter()
        .flat_map(|s| &s.transitions)
        .find_map(|t| match t {
            Transition::Set { set, .. } => Some(set),
            _ => None,
        })
        .expect("set transition");
    assert!(set.contains('a' as i32));
    assert!(set.contains('Z' as i32));
    assert!(!set.contains('0' as i32));
    assert!(!set.contains(-1));
}

#[test]
fn test_bad_version_rejected() {
    let mut payload = sample_grammar().serialize();
    payload[0] = 7;
    let result = AtnDeserializer::default().deserialize(&payload);
    assert!(matches!(
        result,
        Err(DeserializeError::BadVersion { found: 7, expected: 3 })
    ));
}

#[test]
fn test_unknown_uuid_rejected() {
    let mut payload = sample_grammar().serialize();
    // Corrupt one UUID unit (elements 1..=8 hold the UUID).
    payload[4] = payload[4].wrapping_add(1);
    let result = AtnDeserializer::default().deserialize(&payload);
    assert!(matches!(result, Err(DeserializeError::UnknownUuid { .. })));
}

#[test]
fn test_unknown_grammar_type_rejected() {
    let mut payload = sample_grammar().serialize();
    // Element 9 is the grammar type (+2 offset).
    payload[9] = 5 + 2;
    let result = AtnDeserializer::default().deserialize(&payload);
    assert!(matches!(
        result,
        Err(DeserializeError::UnknownCode { what: "grammar type", code: 5, .. })
    ));
}

#[test]
fn test_unknown_state_type_rejected() {
    let mut payload = sample_grammar().serialize();
    // Element 11 is the state count, element 12 the first state's type.
    payload[12] = 13 + 2;
    let result = AtnDeserializer::default().deserialize(&payload);
    assert!(matches!(
        result,
        Err(DeserializeError::UnknownCode { what: "state type", code: 13, .. })
    ));
}

#[test]
fn test_truncated_payload_rejected() {
    let payload = sample_grammar().serialize();
    let cut = &payload[..payload.len() / 2];
    let result = AtnDeserializer::default().deserialize(cut);
    assert!(matches!(result, Err(DeserializeError::Truncated { .. })));
}

#[test]
fn test_verification_catches_unpatched_plus_block() {
    // A plus block whose loop-back state never points at it.
    let mut b = AtnBuilder::lexer(1);
    let mode = b.token_start();
    let start = b.rule_start(0);
    let stop = b.rule_stop(0);
    b.rule(start, 1);
    let end = b.block_end(0);
    let block = b.plus_block_start(0, end);
    let from = b.basic(0);
    let to = b.basic(0);
    b.epsilon(start, block);
    b.epsilon(block, from);
    b.atom(from, to, 'x');
    b.epsilon(to, end);
    b.epsilon(end, stop);
    b.epsilon(mode, start);

    let payload = b.serialize();
    let strict = AtnDeserializer::default().deserialize(&payload);
    assert!(matches!(
        strict,
        Err(DeserializeError::Inconsistent { .. })
    ));

    let lax = AtnDeserializer::new(DeserializeOptions { verify: false }).deserialize(&payload);
    assert!(lax.is_ok());
}

#[test]
fn test_verification_catches_misarranged_star_loop() {
    // Greedy transition order but the non-greedy flag set.
    let mut b = AtnBuilder::lexer(1);
    let mode = b.token_start();
    let start = b.rule_start(0);
    let stop = b.rule_stop(0);
    b.rule(start, 1);

    let entry = b.star_loop_entry(0);
    let end = b.block_end(0);
    let block = b.star_block_start(0, end);
    let loop_back = b.star_loop_back(0);
    let loop_end = b.loop_end(0, loop_back);
    let from = b.basic(0);
    let to = b.basic(0);
    b.epsilon(start, entry);
    b.epsilon(entry, block);
    b.epsilon(entry, loop_end);
    b.epsilon(block, from);
    b.wildcard(from, to);
    b.epsilon(to, end);
    b.epsilon(end, loop_back);
    b.epsilon(loop_back, entry);
    b.epsilon(loop_end, stop);
    b.mark_non_greedy(entry);
    b.epsilon(mode, start);

    let result = AtnDeserializer::default().deserialize(&b.serialize());
    match result {
        Err(DeserializeError::Inconsistent { reason, .. }) => {
            assert!(reason.contains("star loop entry"));
        }
        other => panic!("expected inconsistency, got {other:?}"),
    }
}

#[test]
fn test_supplementary_plane_set_round_trip() {
    // Emoji-range rule; endpoints only fit the 32-bit set encoding.
    let mut b = AtnBuilder::lexer(1);
    let mode = b.token_start();
    let emoji = b.set(&[(0x1F600, 0x1F64F)]);
    let rule = b.char_class_plus_rule(0, 1, emoji);
    b.finish(rule);
    b.epsilon(mode, rule.start);

    let atn = AtnDeserializer::default()
        .deserialize(&b.serialize())
        .expect("payload");
    let set = atn
        .states
        .iter()
        .flat_map(|s| &s.transitions)
        .find_map(|t| match t {
            Transition::Set { set, .. } => Some(set),
            _ => None,
        })
        .expect("set transition");
    assert!(set.contains(0x1F600));
    assert!(set.contains(0x1F64F));
    assert!(!set.contains(0x1F650));
}
