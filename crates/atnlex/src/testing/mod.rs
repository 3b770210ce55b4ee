//! # Test Support
//!
//! Programmatic assembly of serialized ATN payloads.
//!
//! ## Overview
//!
//! [`AtnBuilder`] records states, edges, rules, modes, match sets and lexer
//! actions, then emits the version-3 payload via [`AtnBuilder::serialize`].
//! Tests hand that payload to the production
//! [`crate::atn::AtnDeserializer`], so everything built here exercises the
//! same decoding path a generated lexer uses. The builder writes the
//! Unicode-supplementary feature UUID and puts every match set in the
//! 32-bit block.
//!
//! State arguments reference other states by number, so allocate referenced
//! states (block ends, loop backs) before the states that point at them.

use crate::atn::GrammarType;

const STATE_BASIC: u16 = 1;
const STATE_RULE_START: u16 = 2;
const STATE_BLOCK_START: u16 = 3;
const STATE_PLUS_BLOCK_START: u16 = 4;
const STATE_STAR_BLOCK_START: u16 = 5;
const STATE_TOKEN_START: u16 = 6;
const STATE_RULE_STOP: u16 = 7;
const STATE_BLOCK_END: u16 = 8;
const STATE_STAR_LOOP_BACK: u16 = 9;
const STATE_STAR_LOOP_ENTRY: u16 = 10;
const STATE_PLUS_LOOP_BACK: u16 = 11;
const STATE_LOOP_END: u16 = 12;

const EDGE_EPSILON: u16 = 1;
const EDGE_RANGE: u16 = 2;
const EDGE_RULE: u16 = 3;
const EDGE_PREDICATE: u16 = 4;
const EDGE_ATOM: u16 = 5;
const EDGE_ACTION: u16 = 6;
const EDGE_SET: u16 = 7;
const EDGE_NOT_SET: u16 = 8;
const EDGE_WILDCARD: u16 = 9;

const ACTION_CHANNEL: u16 = 0;
const ACTION_CUSTOM: u16 = 1;
const ACTION_MODE: u16 = 2;
const ACTION_MORE: u16 = 3;
const ACTION_POP_MODE: u16 = 4;
const ACTION_PUSH_MODE: u16 = 5;
const ACTION_SKIP: u16 = 6;
const ACTION_TYPE: u16 = 7;

/// Serialized form of the `ADDED_UNICODE_SMP` feature UUID,
/// least-significant unit first.
const UNICODE_SMP_UUID_UNITS: [u16; 8] = [
    0x6089, 0xA728, 0x8131, 0xB9EB, 0x417A, 0x3BE5, 0x7784, 0x5962,
];

#[derive(Debug, Clone)]
struct StateSpec {
    type_code: u16,
    rule_index: i32,
    arg: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
struct EdgeSpec {
    src: usize,
    trg: usize,
    type_code: u16,
    arg1: usize,
    arg2: usize,
    arg3: usize,
}

#[derive(Debug, Clone)]
struct SetSpec {
    /// Inclusive code-point ranges, the serialized form.
    intervals: Vec<(i32, i32)>,
    contains_eof: bool,
}

/// Assembles a serialized ATN payload. See the module docs.
#[derive(Debug, Clone)]
pub struct AtnBuilder {
    grammar_type: GrammarType,
    max_token_type: i32,
    states: Vec<StateSpec>,
    non_greedy: Vec<usize>,
    precedence: Vec<usize>,
    /// `(start_state, token_type)` per rule.
    rules: Vec<(usize, i32)>,
    modes: Vec<usize>,
    sets: Vec<SetSpec>,
    edges: Vec<EdgeSpec>,
    decisions: Vec<usize>,
    /// `(type, data1, data2)` per action.
    actions: Vec<(u16, i32, i32)>,
}

impl AtnBuilder {
    /// A builder for a lexer grammar with the given largest token type.
    #[must_use]
    pub fn lexer(max_token_type: i32) -> Self {
        Self {
            grammar_type: GrammarType::Lexer,
            max_token_type,
            states: Vec::new(),
            non_greedy: Vec::new(),
            precedence: Vec::new(),
            rules: Vec::new(),
            modes: Vec::new(),
            sets: Vec::new(),
            edges: Vec::new(),
            decisions: Vec::new(),
            actions: Vec::new(),
        }
    }

    fn state(&mut self, type_code: u16, rule_index: i32, arg: Option<usize>) -> usize {
        let number = self.states.len();
        self.states.push(StateSpec { type_code, rule_index, arg });
        number
    }

    pub fn basic(&mut self, rule: usize) -> usize {
        self.state(STATE_BASIC, rule as i32, None)
    }

    pub fn rule_start(&mut self, rule: usize) -> usize {
        self.state(STATE_RULE_START, rule as i32, None)
    }

    pub fn rule_stop(&mut self, rule: usize) -> usize {
        self.state(STATE_RULE_STOP, rule as i32, None)
    }

    /// The start state of a lexer mode; registered as that mode's entry.
    pub fn token_start(&mut self) -> usize {
        let number = self.state(STATE_TOKEN_START, -1, None);
        self.modes.push(number);
        number
    }

    pub fn block_start(&mut self, rule: usize, end_state: usize) -> usize {
        self.state(STATE_BLOCK_START, rule as i32, Some(end_state))
    }

    pub fn plus_block_start(&mut self, rule: usize, end_state: usize) -> usize {
        self.state(STATE_PLUS_BLOCK_START, rule as i32, Some(end_state))
    }

    pub fn star_block_start(&mut self, rule: usize, end_state: usize) -> usize {
        self.state(STATE_STAR_BLOCK_START, rule as i32, Some(end_state))
    }

    pub fn block_end(&mut self, rule: usize) -> usize {
        self.state(STATE_BLOCK_END, rule as i32, None)
    }

    pub fn star_loop_entry(&mut self, rule: usize) -> usize {
        self.state(STATE_STAR_LOOP_ENTRY, rule as i32, None)
    }

    pub fn star_loop_back(&mut self, rule: usize) -> usize {
        self.state(STATE_STAR_LOOP_BACK, rule as i32, None)
    }

    pub fn plus_loop_back(&mut self, rule: usize) -> usize {
        self.state(STATE_PLUS_LOOP_BACK, rule as i32, None)
    }

    pub fn loop_end(&mut self, rule: usize, loop_back: usize) -> usize {
        self.state(STATE_LOOP_END, rule as i32, Some(loop_back))
    }

    /// Register a rule: its start state and the token type it emits.
    pub fn rule(&mut self, start_state: usize, token_type: i32) -> usize {
        self.rules.push((start_state, token_type));
        self.rules.len() - 1
    }

    pub fn mark_non_greedy(&mut self, state: usize) {
        self.non_greedy.push(state);
    }

    pub fn decision(&mut self, state: usize) -> usize {
        self.decisions.push(state);
        self.decisions.len() - 1
    }

    /// Register a match set of inclusive code-point ranges.
    pub fn set(&mut self, intervals: &[(i32, i32)]) -> usize {
        self.sets.push(SetSpec {
            intervals: intervals.to_vec(),
            contains_eof: false,
        });
        self.sets.len() - 1
    }

    fn edge(&mut self, src: usize, trg: usize, type_code: u16, args: [usize; 3]) {
        self.edges.push(EdgeSpec {
            src,
            trg,
            type_code,
            arg1: args[0],
            arg2: args[1],
            arg3: args[2],
        });
    }

    pub fn epsilon(&mut self, src: usize, trg: usize) {
        self.edge(src, trg, EDGE_EPSILON, [0, 0, 0]);
    }

    pub fn atom(&mut self, src: usize, trg: usize, symbol: char) {
        self.edge(src, trg, EDGE_ATOM, [symbol as usize, 0, 0]);
    }

    /// Inclusive code-point range edge.
    pub fn range(&mut self, src: usize, trg: usize, lo: char, hi: char) {
        self.edge(src, trg, EDGE_RANGE, [lo as usize, hi as usize, 0]);
    }

    pub fn set_edge(&mut self, src: usize, trg: usize, set: usize) {
        self.edge(src, trg, EDGE_SET, [set, 0, 0]);
    }

    pub fn not_set_edge(&mut self, src: usize, trg: usize, set: usize) {
        self.edge(src, trg, EDGE_NOT_SET, [set, 0, 0]);
    }

    pub fn wildcard(&mut self, src: usize, trg: usize) {
        self.edge(src, trg, EDGE_WILDCARD, [0, 0, 0]);
    }

    pub fn rule_call(
        &mut self,
        src: usize,
        rule_start: usize,
        rule: usize,
        follow: usize,
    ) {
        self.edge(src, follow, EDGE_RULE, [rule_start, rule, 0]);
    }

    pub fn predicate(&mut self, src: usize, trg: usize, rule: usize, pred: usize) {
        self.edge(src, trg, EDGE_PREDICATE, [rule, pred, 0]);
    }

    pub fn action_edge(&mut self, src: usize, trg: usize, rule: usize, action: usize) {
        self.edge(src, trg, EDGE_ACTION, [rule, action, 0]);
    }

    fn action(&mut self, type_code: u16, data1: i32, data2: i32) -> usize {
        self.actions.push((type_code, data1, data2));
        self.actions.len() - 1
    }

    pub fn skip_action(&mut self) -> usize {
        self.action(ACTION_SKIP, 0, 0)
    }

    pub fn more_action(&mut self) -> usize {
        self.action(ACTION_MORE, 0, 0)
    }

    pub fn pop_mode_action(&mut self) -> usize {
        self.action(ACTION_POP_MODE, 0, 0)
    }

    pub fn push_mode_action(&mut self, mode: usize) -> usize {
        self.action(ACTION_PUSH_MODE, mode as i32, 0)
    }

    pub fn mode_action(&mut self, mode: usize) -> usize {
        self.action(ACTION_MODE, mode as i32, 0)
    }

    pub fn channel_action(&mut self, channel: u32) -> usize {
        self.action(ACTION_CHANNEL, channel as i32, 0)
    }

    pub fn type_action(&mut self, token_type: i32) -> usize {
        self.action(ACTION_TYPE, token_type, 0)
    }

    pub fn custom_action(&mut self, rule: usize, action: usize) -> usize {
        self.action(ACTION_CUSTOM, rule as i32, action as i32)
    }

    /// Emit the version-3 payload.
    #[must_use]
    pub fn serialize(&self) -> Vec<u16> {
        let mut out = Vec::new();
        out.push(3u16);
        let push = |out: &mut Vec<u16>, value: u16| out.push(value.wrapping_add(2));
        let push_i32 = |out: &mut Vec<u16>, value: i32| {
            push(out, if value == -1 { 0xFFFF } else { value as u16 });
        };
        let push_wide = |out: &mut Vec<u16>, value: i32| {
            let value = value as u32;
            push(out, (value & 0xFFFF) as u16);
            push(out, (value >> 16) as u16);
        };

        for unit in UNICODE_SMP_UUID_UNITS {
            push(&mut out, unit);
        }

        push(&mut out, match self.grammar_type {
            GrammarType::Lexer => 0,
            GrammarType::Parser => 1,
        });
        push_i32(&mut out, self.max_token_type);

        push(&mut out, self.states.len() as u16);
        for state in &self.states {
            push(&mut out, state.type_code);
            push_i32(&mut out, state.rule_index);
            if let Some(arg) = state.arg {
                push(&mut out, arg as u16);
            }
        }

        push(&mut out, self.non_greedy.len() as u16);
        for &state in &self.non_greedy {
            push(&mut out, state as u16);
        }
        push(&mut out, self.precedence.len() as u16);
        for &state in &self.precedence {
            push(&mut out, state as u16);
        }

        push(&mut out, self.rules.len() as u16);
        for &(start, token_type) in &self.rules {
            push(&mut out, start as u16);
            if self.grammar_type == GrammarType::Lexer {
                push_i32(&mut out, token_type);
            }
        }

        push(&mut out, self.modes.len() as u16);
        for &mode in &self.modes {
            push(&mut out, mode as u16);
        }

        // 16-bit set block stays empty; every set goes in the 32-bit block
        // enabled by the Unicode-supplementary UUID.
        push(&mut out, 0);
        push(&mut out, self.sets.len() as u16);
        for set in &self.sets {
            push(&mut out, set.intervals.len() as u16);
            push(&mut out, u16::from(set.contains_eof));
            for &(lo, hi) in &set.intervals {
                push_wide(&mut out, lo);
                push_wide(&mut out, hi);
            }
        }

        push(&mut out, self.edges.len() as u16);
        for edge in &self.edges {
            push(&mut out, edge.src as u16);
            push(&mut out, edge.trg as u16);
            push(&mut out, edge.type_code);
            push(&mut out, edge.arg1 as u16);
            push(&mut out, edge.arg2 as u16);
            push(&mut out, edge.arg3 as u16);
        }

        push(&mut out, self.decisions.len() as u16);
        for &state in &self.decisions {
            push(&mut out, state as u16);
        }

        if self.grammar_type == GrammarType::Lexer {
            push(&mut out, self.actions.len() as u16);
            for &(type_code, data1, data2) in &self.actions {
                push(&mut out, type_code);
                push_i32(&mut out, data1);
                push_i32(&mut out, data2);
            }
        }

        out
    }
}

/// A partially wired rule: `tail` still needs a path to `stop`, either a
/// plain epsilon ([`AtnBuilder::finish`]) or an action transition
/// ([`AtnBuilder::finish_with_action`]).
#[derive(Debug, Clone, Copy)]
pub struct RuleShape {
    pub rule: usize,
    pub start: usize,
    pub stop: usize,
    pub tail: usize,
}

/// Common rule shapes shared by the integration tests. Wire each shape's
/// start state into a mode with an epsilon from the mode's token-start
/// state.
impl AtnBuilder {
    /// A `<set>+` plus-loop segment. Returns `(entry, exit)`: route into
    /// `entry`, continue from `exit`.
    pub fn plus_segment(&mut self, rule: usize, set: usize) -> (usize, usize) {
        let end = self.block_end(rule);
        let block = self.plus_block_start(rule, end);
        let loop_back = self.plus_loop_back(rule);
        let loop_end = self.loop_end(rule, loop_back);
        let consume_from = self.basic(rule);
        let consumed = self.basic(rule);

        self.epsilon(block, consume_from);
        self.set_edge(consume_from, consumed, set);
        self.epsilon(consumed, end);
        self.epsilon(end, loop_back);
        // Greedy: re-enter the block before leaving the loop.
        self.epsilon(loop_back, block);
        self.epsilon(loop_back, loop_end);
        self.decision(block);
        self.decision(loop_back);
        (block, loop_end)
    }

    /// A non-greedy `.*?` star-loop segment. Returns `(entry, exit)`.
    pub fn non_greedy_star_segment(&mut self, rule: usize) -> (usize, usize) {
        let entry = self.star_loop_entry(rule);
        let end = self.block_end(rule);
        let block = self.star_block_start(rule, end);
        let loop_back = self.star_loop_back(rule);
        let loop_end = self.loop_end(rule, loop_back);
        let consume_from = self.basic(rule);
        let consumed = self.basic(rule);

        // Non-greedy: the exit comes before the block.
        self.epsilon(entry, loop_end);
        self.epsilon(entry, block);
        self.epsilon(block, consume_from);
        self.wildcard(consume_from, consumed);
        self.epsilon(consumed, end);
        self.epsilon(end, loop_back);
        self.epsilon(loop_back, entry);
        self.mark_non_greedy(entry);
        self.decision(entry);
        self.decision(block);
        (entry, loop_end)
    }

    /// `RULE: <set>+ ;` in the canonical plus-loop shape.
    pub fn char_class_plus_rule(&mut self, rule: usize, token_type: i32, set: usize) -> RuleShape {
        let start = self.rule_start(rule);
        let stop = self.rule_stop(rule);
        self.rule(start, token_type);
        let (entry, exit) = self.plus_segment(rule, set);
        self.epsilon(start, entry);
        RuleShape { rule, start, stop, tail: exit }
    }

    /// `RULE: 'text' ;`.
    pub fn literal_rule(&mut self, rule: usize, token_type: i32, text: &str) -> RuleShape {
        let start = self.rule_start(rule);
        let stop = self.rule_stop(rule);
        self.rule(start, token_type);
        let mut current = self.basic(rule);
        self.epsilon(start, current);
        for symbol in text.chars() {
            let next = self.basic(rule);
            self.atom(current, next, symbol);
            current = next;
        }
        RuleShape { rule, start, stop, tail: current }
    }

    /// Close a rule with a plain epsilon to its stop state.
    pub fn finish(&mut self, shape: RuleShape) {
        self.epsilon(shape.tail, shape.stop);
    }

    /// Close a rule through an action transition (`-> skip`,
    /// `-> channel(...)`, mode operations, ...).
    pub fn finish_with_action(&mut self, shape: RuleShape, action: usize) {
        self.action_edge(shape.tail, shape.stop, shape.rule, action);
    }
}
