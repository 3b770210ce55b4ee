//! Serialized ATN decoding.
//!
//! The payload is a sequence of 16-bit code units produced ahead-of-time by
//! the parser generator. Element 0 is the format version, stored raw; every
//! later element was offset by +2 at serialization time, so decoding
//! subtracts 2 with wraparound (`0 -> 65534`, `1 -> 65535`). A 16-byte UUID
//! after the version identifies the feature set; the `ADDED_UNICODE_SMP`
//! UUID enables a second set block whose endpoints span the supplementary
//! planes as `low | high << 16`.

use crate::action::LexerAction;
use crate::atn::state::{AtnState, AtnStateKind, StateNumber};
use crate::atn::transition::Transition;
use crate::atn::{Atn, GrammarType};
use crate::error::DeserializeError;
use crate::interval::IntervalSet;
use crate::stream::EOF;
use std::fmt;
use std::sync::Arc;

/// The payload format version this deserializer understands.
pub const SERIALIZED_VERSION: u16 = 3;

/// Feature-set identifier embedded in the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Uuid {
    msb: u64,
    lsb: u64,
}

/// The original feature set.
const BASE_UUID: Uuid = Uuid {
    msb: 0x3376_1B2D_78BB_4A43,
    lsb: 0x8B0B_4F5B_EE8A_ACF3,
};

/// Adds the 32-bit set block for supplementary-plane code points.
const ADDED_UNICODE_SMP_UUID: Uuid = Uuid {
    msb: 0x5962_7784_3BE5_417A,
    lsb: 0xB9EB_8131_A728_6089,
};

/// Recognized feature sets, oldest first; a payload UUID supports every
/// feature at or before its position.
const SUPPORTED_UUIDS: [Uuid; 2] = [BASE_UUID, ADDED_UNICODE_SMP_UUID];

impl Uuid {
    /// Assemble from eight 16-bit units, least-significant first.
    fn from_units(units: &[u16; 8]) -> Self {
        let word = |a: u16, b: u16, c: u16, d: u16| {
            u64::from(a) | u64::from(b) << 16 | u64::from(c) << 32 | u64::from(d) << 48
        };
        Self {
            lsb: word(units[0], units[1], units[2], units[3]),
            msb: word(units[4], units[5], units[6], units[7]),
        }
    }

    fn feature_index(self) -> Option<usize> {
        SUPPORTED_UUIDS.iter().position(|&u| u == self)
    }
}

impl fmt::Display for Uuid {
    /// Canonical 8-4-4-4-12 form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08X}-{:04X}-{:04X}-{:04X}-{:012X}",
            self.msb >> 32,
            (self.msb >> 16) & 0xFFFF,
            self.msb & 0xFFFF,
            self.lsb >> 48,
            self.lsb & 0xFFFF_FFFF_FFFF,
        )
    }
}

/// Deserializer configuration.
#[derive(Debug, Clone, Copy)]
pub struct DeserializeOptions {
    /// Run structural verification over the decoded graph.
    pub verify: bool,
}

impl Default for DeserializeOptions {
    fn default() -> Self {
        Self { verify: true }
    }
}

struct Reader<'a> {
    data: &'a [u16],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u16]) -> Self {
        Self { data, pos: 0 }
    }

    /// Next element without the serialization offset (the version field).
    fn read_raw(&mut self) -> Result<u16, DeserializeError> {
        let value = self
            .data
            .get(self.pos)
            .copied()
            .ok_or(DeserializeError::Truncated { offset: self.pos })?;
        self.pos += 1;
        Ok(value)
    }

    /// Next element, undoing the +2 serialization offset.
    fn read(&mut self) -> Result<u16, DeserializeError> {
        Ok(self.read_raw()?.wrapping_sub(2))
    }

    fn read_usize(&mut self) -> Result<usize, DeserializeError> {
        Ok(usize::from(self.read()?))
    }

    /// Value where `0xFFFF` means "none" / EOF.
    fn read_i32(&mut self) -> Result<i32, DeserializeError> {
        let value = self.read()?;
        Ok(if value == 0xFFFF { -1 } else { i32::from(value) })
    }

    /// 32-bit value stored as `low | high << 16`.
    fn read_i32_wide(&mut self) -> Result<i32, DeserializeError> {
        let low = u32::from(self.read()?);
        let high = u32::from(self.read()?);
        Ok((low | high << 16) as i32)
    }
}

/// Decodes a serialized payload into an [`Atn`]. Stateless apart from its
/// options; one instance may decode any number of payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct AtnDeserializer {
    options: DeserializeOptions,
}

impl AtnDeserializer {
    #[must_use]
    pub fn new(options: DeserializeOptions) -> Self {
        Self { options }
    }

    /// Decode `data` into a transition network.
    ///
    /// # Errors
    ///
    /// Returns [`DeserializeError`] for unsupported payloads (version,
    /// feature UUID, unknown codes, truncation) or, when verification is
    /// enabled, for structurally inconsistent graphs.
    pub fn deserialize(&self, data: &[u16]) -> Result<Atn, DeserializeError> {
        let mut reader = Reader::new(data);

        let version = reader.read_raw()?;
        if version != SERIALIZED_VERSION {
            return Err(DeserializeError::BadVersion {
                found: version,
                expected: SERIALIZED_VERSION,
            });
        }

        let mut units = [0u16; 8];
        for unit in &mut units {
            *unit = reader.read()?;
        }
        let uuid = Uuid::from_units(&units);
        let Some(feature_level) = uuid.feature_index() else {
            return Err(DeserializeError::UnknownUuid { uuid: uuid.to_string() });
        };
        let supports_unicode_smp = feature_level >= 1;

        let grammar_type = match reader.read()? {
            0 => GrammarType::Lexer,
            1 => GrammarType::Parser,
            code => {
                return Err(DeserializeError::UnknownCode {
                    what: "grammar type",
                    code: u32::from(code),
                    offset: reader.pos - 1,
                })
            }
        };
        let max_token_type = i32::from(reader.read()?);

        let states = self.read_states(&mut reader)?;
        let mut atn = Atn {
            grammar_type,
            max_token_type,
            states,
            rule_to_start_state: Vec::new(),
            rule_to_stop_state: Vec::new(),
            rule_to_token_type: Vec::new(),
            mode_to_start_state: Vec::new(),
            decision_to_state: Vec::new(),
            lexer_actions: Vec::new(),
        };

        self.read_non_greedy_states(&mut reader, &mut atn)?;
        self.read_precedence_states(&mut reader, &mut atn)?;
        self.read_rules(&mut reader, &mut atn)?;
        self.read_modes(&mut reader, &mut atn)?;

        let mut sets: Vec<Arc<IntervalSet>> = Vec::new();
        Self::read_sets(&mut reader, &mut sets, false)?;
        if supports_unicode_smp {
            Self::read_sets(&mut reader, &mut sets, true)?;
        }

        self.read_edges(&mut reader, &mut atn, &sets)?;
        Self::synthesize_rule_stop_edges(&mut atn)?;
        Self::patch_back_links(&mut atn)?;
        self.read_decisions(&mut reader, &mut atn)?;
        if atn.grammar_type == GrammarType::Lexer {
            self.read_lexer_actions(&mut reader, &mut atn)?;
        }

        Self::mark_precedence_decisions(&mut atn);
        if self.options.verify {
            Self::verify_atn(&atn)?;
        }
        Ok(atn)
    }

    fn read_states(&self, reader: &mut Reader<'_>) -> Result<Vec<AtnState>, DeserializeError> {
        let count = reader.read_usize()?;
        let mut states = Vec::with_capacity(count);
        for number in 0..count {
            let type_offset = reader.pos;
            let state_type = reader.read()?;
            if state_type == 0 {
                // Removed state; keep a placeholder so numbering holds.
                states.push(AtnState::new(number, AtnStateKind::Basic, -1));
                continue;
            }
            let rule_index = reader.read_i32()?;
            let kind = match state_type {
                1 => AtnStateKind::Basic,
                2 => AtnStateKind::RuleStart {
                    stop_state: None,
                    is_precedence_rule: false,
                },
                3 => AtnStateKind::BlockStart {
                    end_state: Some(reader.read_usize()?),
                },
                4 => AtnStateKind::PlusBlockStart {
                    end_state: Some(reader.read_usize()?),
                    loop_back: None,
                },
                5 => AtnStateKind::StarBlockStart {
                    end_state: Some(reader.read_usize()?),
                },
                6 => AtnStateKind::TokenStart,
                7 => AtnStateKind::RuleStop,
                8 => AtnStateKind::BlockEnd { start_state: None },
                9 => AtnStateKind::StarLoopBack,
                10 => AtnStateKind::StarLoopEntry {
                    loop_back: None,
                    is_precedence_decision: false,
                },
                11 => AtnStateKind::PlusLoopBack,
                12 => AtnStateKind::LoopEnd {
                    loop_back: Some(reader.read_usize()?),
                },
                code => {
                    return Err(DeserializeError::UnknownCode {
                        what: "state type",
                        code: u32::from(code),
                        offset: type_offset,
                    })
                }
            };
            states.push(AtnState::new(number, kind, rule_index));
        }
        Ok(states)
    }

    fn read_non_greedy_states(
        &self,
        reader: &mut Reader<'_>,
        atn: &mut Atn,
    ) -> Result<(), DeserializeError> {
        let count = reader.read_usize()?;
        for _ in 0..count {
            let number = reader.read_usize()?;
            let state = Self::state_mut(atn, number)?;
            state.non_greedy = true;
        }
        Ok(())
    }

    fn read_precedence_states(
        &self,
        reader: &mut Reader<'_>,
        atn: &mut Atn,
    ) -> Result<(), DeserializeError> {
        let count = reader.read_usize()?;
        for _ in 0..count {
            let number = reader.read_usize()?;
            let state = Self::state_mut(atn, number)?;
            match &mut state.kind {
                AtnStateKind::RuleStart { is_precedence_rule, .. } => {
                    *is_precedence_rule = true;
                }
                _ => {
                    return Err(DeserializeError::Inconsistent {
                        reason: "precedence state is not a rule start".into(),
                        state: number,
                    })
                }
            }
        }
        Ok(())
    }

    fn read_rules(&self, reader: &mut Reader<'_>, atn: &mut Atn) -> Result<(), DeserializeError> {
        let count = reader.read_usize()?;
        for _ in 0..count {
            let start = reader.read_usize()?;
            Self::check_state(atn, start)?;
            atn.rule_to_start_state.push(start);
            if atn.grammar_type == GrammarType::Lexer {
                let token_type = reader.read_i32()?;
                atn.rule_to_token_type.push(token_type);
            }
        }

        atn.rule_to_stop_state = vec![0; count];
        let stops: Vec<(usize, StateNumber)> = atn
            .states
            .iter()
            .filter(|s| s.is_rule_stop())
            .map(|s| (s.rule_index as usize, s.number))
            .collect();
        for (rule, stop) in stops {
            if rule >= count {
                return Err(DeserializeError::Inconsistent {
                    reason: format!("rule stop state references rule {rule} of {count}"),
                    state: stop,
                });
            }
            atn.rule_to_stop_state[rule] = stop;
            let start = atn.rule_to_start_state[rule];
            if let AtnStateKind::RuleStart { stop_state, .. } = &mut atn.states[start].kind {
                *stop_state = Some(stop);
            }
        }
        Ok(())
    }

    fn read_modes(&self, reader: &mut Reader<'_>, atn: &mut Atn) -> Result<(), DeserializeError> {
        let count = reader.read_usize()?;
        for _ in 0..count {
            let number = reader.read_usize()?;
            Self::check_state(atn, number)?;
            atn.mode_to_start_state.push(number);
        }
        Ok(())
    }

    fn read_sets(
        reader: &mut Reader<'_>,
        sets: &mut Vec<Arc<IntervalSet>>,
        wide: bool,
    ) -> Result<(), DeserializeError> {
        let count = reader.read_usize()?;
        for _ in 0..count {
            let intervals = reader.read_usize()?;
            let mut set = IntervalSet::new();
            let contains_eof = reader.read()? != 0;
            if contains_eof {
                set.add(EOF);
            }
            for _ in 0..intervals {
                let (lo, hi) = if wide {
                    (reader.read_i32_wide()?, reader.read_i32_wide()?)
                } else {
                    (i32::from(reader.read()?), i32::from(reader.read()?))
                };
                // Serialized endpoints are inclusive.
                set.add_range(lo, hi + 1);
            }
            sets.push(Arc::new(set));
        }
        Ok(())
    }

    fn read_edges(
        &self,
        reader: &mut Reader<'_>,
        atn: &mut Atn,
        sets: &[Arc<IntervalSet>],
    ) -> Result<(), DeserializeError> {
        let count = reader.read_usize()?;
        for _ in 0..count {
            let src = reader.read_usize()?;
            let trg = reader.read_usize()?;
            let edge_offset = reader.pos;
            let edge_type = reader.read()?;
            let arg1 = reader.read_usize()?;
            let arg2 = reader.read_usize()?;
            let arg3 = reader.read_usize()?;
            Self::check_state(atn, src)?;
            Self::check_state(atn, trg)?;

            let transition = match edge_type {
                1 => Transition::Epsilon {
                    target: trg,
                    outermost_precedence_return: -1,
                },
                2 => {
                    if arg3 != 0 {
                        Transition::Range { target: trg, lo: EOF, hi: arg2 as i32 }
                    } else {
                        Transition::Range {
                            target: trg,
                            lo: arg1 as i32,
                            hi: arg2 as i32,
                        }
                    }
                }
                3 => {
                    Self::check_state(atn, arg1)?;
                    Transition::Rule {
                        target: arg1,
                        follow: trg,
                        rule_index: arg2,
                        precedence: arg3 as i32,
                    }
                }
                4 => Transition::Predicate {
                    target: trg,
                    rule_index: arg1,
                    pred_index: arg2,
                    is_ctx_dependent: arg3 != 0,
                },
                5 => {
                    if arg3 != 0 {
                        Transition::Atom { target: trg, symbol: EOF }
                    } else {
                        Transition::Atom { target: trg, symbol: arg1 as i32 }
                    }
                }
                6 => Transition::Action {
                    target: trg,
                    rule_index: arg1,
                    action_index: arg2,
                    is_ctx_dependent: arg3 != 0,
                },
                7 | 8 => {
                    let set = sets.get(arg1).cloned().ok_or_else(|| {
                        DeserializeError::Inconsistent {
                            reason: format!("edge references set {arg1} of {}", sets.len()),
                            state: src,
                        }
                    })?;
                    if edge_type == 7 {
                        Transition::Set { target: trg, set }
                    } else {
                        Transition::NotSet { target: trg, set }
                    }
                }
                9 => Transition::Wildcard { target: trg },
                10 => Transition::PrecedencePredicate {
                    target: trg,
                    precedence: arg1 as i32,
                },
                code => {
                    return Err(DeserializeError::UnknownCode {
                        what: "transition",
                        code: u32::from(code),
                        offset: edge_offset,
                    })
                }
            };
            atn.states[src].add_transition(transition);
        }
        Ok(())
    }

    /// Return edges out of rule invocations are derivable, so they are not
    /// serialized: every rule transition contributes an epsilon from the
    /// callee's stop state to its own follow state.
    fn synthesize_rule_stop_edges(atn: &mut Atn) -> Result<(), DeserializeError> {
        let mut synthesized: Vec<(StateNumber, Transition)> = Vec::new();
        for state in &atn.states {
            for transition in &state.transitions {
                let Transition::Rule { rule_index, follow, precedence, .. } = transition else {
                    continue;
                };
                let start = atn.rule_to_start_state.get(*rule_index).copied().ok_or(
                    DeserializeError::Inconsistent {
                        reason: format!("rule transition references rule {rule_index}"),
                        state: state.number,
                    },
                )?;
                let is_precedence_rule = matches!(
                    atn.states[start].kind,
                    AtnStateKind::RuleStart { is_precedence_rule: true, .. }
                );
                let outermost_precedence_return = if is_precedence_rule && *precedence == 0 {
                    *rule_index as i32
                } else {
                    -1
                };
                synthesized.push((
                    atn.rule_to_stop_state[*rule_index],
                    Transition::Epsilon {
                        target: *follow,
                        outermost_precedence_return,
                    },
                ));
            }
        }
        for (stop, transition) in synthesized {
            atn.states[stop].add_transition(transition);
        }
        Ok(())
    }

    /// Second patch-up pass once all states and edges exist: block ends
    /// learn their block starts, and loop-back states are wired into the
    /// block-start / loop-entry states they return to.
    fn patch_back_links(atn: &mut Atn) -> Result<(), DeserializeError> {
        let mut end_patches: Vec<(StateNumber, StateNumber)> = Vec::new();
        let mut loop_patches: Vec<(StateNumber, StateNumber)> = Vec::new();
        for state in &atn.states {
            match &state.kind {
                AtnStateKind::BlockStart { end_state }
                | AtnStateKind::PlusBlockStart { end_state, .. }
                | AtnStateKind::StarBlockStart { end_state } => {
                    let end = end_state.ok_or_else(|| DeserializeError::Inconsistent {
                        reason: "block start without an end state".into(),
                        state: state.number,
                    })?;
                    end_patches.push((end, state.number));
                }
                AtnStateKind::PlusLoopBack | AtnStateKind::StarLoopBack => {
                    for transition in &state.transitions {
                        loop_patches.push((transition.target(), state.number));
                    }
                }
                _ => {}
            }
        }

        for (end, start) in end_patches {
            match &mut atn.states[end].kind {
                AtnStateKind::BlockEnd { start_state } => {
                    if start_state.is_some() {
                        return Err(DeserializeError::Inconsistent {
                            reason: "block end belongs to two block starts".into(),
                            state: end,
                        });
                    }
                    *start_state = Some(start);
                }
                _ => {
                    return Err(DeserializeError::Inconsistent {
                        reason: "block start's end state is not a block end".into(),
                        state: end,
                    })
                }
            }
        }

        for (target, loop_back_state) in loop_patches {
            match &mut atn.states[target].kind {
                AtnStateKind::PlusBlockStart { loop_back, .. }
                | AtnStateKind::StarLoopEntry { loop_back, .. } => {
                    *loop_back = Some(loop_back_state);
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn read_decisions(
        &self,
        reader: &mut Reader<'_>,
        atn: &mut Atn,
    ) -> Result<(), DeserializeError> {
        let count = reader.read_usize()?;
        for decision in 0..count {
            let number = reader.read_usize()?;
            let state = Self::state_mut(atn, number)?;
            state.decision = decision as i32;
            atn.decision_to_state.push(number);
        }
        Ok(())
    }

    fn read_lexer_actions(
        &self,
        reader: &mut Reader<'_>,
        atn: &mut Atn,
    ) -> Result<(), DeserializeError> {
        let count = reader.read_usize()?;
        for _ in 0..count {
            let action_offset = reader.pos;
            let action_type = reader.read()?;
            let data1 = reader.read_i32()?;
            let data2 = reader.read_i32()?;
            let action = match action_type {
                0 => LexerAction::Channel(Self::index_arg(data1, "channel", action_offset)? as u32),
                1 => LexerAction::Custom {
                    rule_index: Self::index_arg(data1, "rule", action_offset)?,
                    action_index: Self::index_arg(data2, "action", action_offset)?,
                },
                2 => LexerAction::Mode(Self::index_arg(data1, "mode", action_offset)?),
                3 => LexerAction::More,
                4 => LexerAction::PopMode,
                5 => LexerAction::PushMode(Self::index_arg(data1, "mode", action_offset)?),
                6 => LexerAction::Skip,
                7 => LexerAction::Type(data1),
                code => {
                    return Err(DeserializeError::UnknownCode {
                        what: "lexer action",
                        code: u32::from(code),
                        offset: action_offset,
                    })
                }
            };
            atn.lexer_actions.push(action);
        }
        Ok(())
    }

    /// A star-loop entry inside a precedence rule whose last transition
    /// reaches a loop end that falls straight through to the rule stop is
    /// the decision point deciding whether the left recursion continues.
    fn mark_precedence_decisions(atn: &mut Atn) {
        let mut precedence_decisions: Vec<StateNumber> = Vec::new();
        for state in &atn.states {
            if !matches!(state.kind, AtnStateKind::StarLoopEntry { .. }) {
                continue;
            }
            let rule = state.rule_index;
            if rule < 0 {
                continue;
            }
            let Some(&start) = atn.rule_to_start_state.get(rule as usize) else {
                continue;
            };
            if !matches!(
                atn.states[start].kind,
                AtnStateKind::RuleStart { is_precedence_rule: true, .. }
            ) {
                continue;
            }
            let Some(last) = state.transitions.last() else {
                continue;
            };
            let maybe_loop_end = &atn.states[last.target()];
            if !matches!(maybe_loop_end.kind, AtnStateKind::LoopEnd { .. }) {
                continue;
            }
            let falls_through_to_stop = maybe_loop_end.epsilon_only_transitions
                && maybe_loop_end
                    .transitions
                    .first()
                    .is_some_and(|t| atn.states[t.target()].is_rule_stop());
            if falls_through_to_stop {
                precedence_decisions.push(state.number);
            }
        }
        for number in precedence_decisions {
            if let AtnStateKind::StarLoopEntry { is_precedence_decision, .. } =
                &mut atn.states[number].kind
            {
                *is_precedence_decision = true;
            }
        }
    }

    /// Structural verification of the decoded graph.
    fn verify_atn(atn: &Atn) -> Result<(), DeserializeError> {
        let fail = |reason: &str, state: StateNumber| DeserializeError::Inconsistent {
            reason: reason.into(),
            state,
        };
        for state in &atn.states {
            match &state.kind {
                AtnStateKind::PlusBlockStart { loop_back, .. } => {
                    if loop_back.is_none() {
                        return Err(fail("plus block start without loop back", state.number));
                    }
                }
                AtnStateKind::StarLoopEntry { loop_back, .. } => {
                    if loop_back.is_none() {
                        return Err(fail("star loop entry without loop back", state.number));
                    }
                    if state.transitions.len() != 2 {
                        return Err(fail(
                            "star loop entry must have exactly two transitions",
                            state.number,
                        ));
                    }
                    let first = &atn.states[state.transitions[0].target()].kind;
                    let second = &atn.states[state.transitions[1].target()].kind;
                    let greedy_shape = matches!(first, AtnStateKind::StarBlockStart { .. })
                        && matches!(second, AtnStateKind::LoopEnd { .. })
                        && !state.non_greedy;
                    let non_greedy_shape = matches!(first, AtnStateKind::LoopEnd { .. })
                        && matches!(second, AtnStateKind::StarBlockStart { .. })
                        && state.non_greedy;
                    if !greedy_shape && !non_greedy_shape {
                        return Err(fail(
                            "star loop entry transitions are misarranged",
                            state.number,
                        ));
                    }
                }
                AtnStateKind::StarLoopBack => {
                    let entry = state.transitions.len() == 1
                        && matches!(
                            atn.states[state.transitions[0].target()].kind,
                            AtnStateKind::StarLoopEntry { .. }
                        );
                    if !entry {
                        return Err(fail(
                            "star loop back must step to its loop entry",
                            state.number,
                        ));
                    }
                }
                AtnStateKind::LoopEnd { loop_back } => {
                    if loop_back.is_none() {
                        return Err(fail("loop end without loop back", state.number));
                    }
                }
                AtnStateKind::RuleStart { stop_state, .. } => {
                    if stop_state.is_none() {
                        return Err(fail("rule start without stop state", state.number));
                    }
                }
                AtnStateKind::BlockEnd { start_state } => {
                    if start_state.is_none() {
                        return Err(fail("block end without block start", state.number));
                    }
                }
                _ => {}
            }

            let simple = state.transitions.len() <= 1
                || state.epsilon_only_transitions
                || state.kind.is_decision()
                || state.is_rule_stop();
            if !simple {
                return Err(fail(
                    "state with multiple labeled transitions is not a decision",
                    state.number,
                ));
            }
        }
        Ok(())
    }

    fn check_state(atn: &Atn, number: StateNumber) -> Result<(), DeserializeError> {
        if number < atn.states.len() {
            Ok(())
        } else {
            Err(DeserializeError::Inconsistent {
                reason: format!("state reference out of range ({})", atn.states.len()),
                state: number,
            })
        }
    }

    fn state_mut(atn: &mut Atn, number: StateNumber) -> Result<&mut AtnState, DeserializeError> {
        let len = atn.states.len();
        atn.states
            .get_mut(number)
            .ok_or(DeserializeError::Inconsistent {
                reason: format!("state reference out of range ({len})"),
                state: number,
            })
    }

    fn index_arg(
        value: i32,
        what: &'static str,
        offset: usize,
    ) -> Result<usize, DeserializeError> {
        usize::try_from(value).map_err(|_| DeserializeError::UnknownCode {
            what,
            code: value as u32,
            offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_display_canonical() {
        assert_eq!(
            BASE_UUID.to_string(),
            "33761B2D-78BB-4A43-8B0B-4F5BEE8AACF3"
        );
        assert_eq!(
            ADDED_UNICODE_SMP_UUID.to_string(),
            "59627784-3BE5-417A-B9EB-8131A7286089"
        );
    }

    #[test]
    fn test_uuid_round_trips_through_units() {
        let units = [
            0xACF3, 0xEE8A, 0x4F5B, 0x8B0B, 0x4A43, 0x78BB, 0x1B2D, 0x3376,
        ];
        assert_eq!(Uuid::from_units(&units), BASE_UUID);
    }

    #[test]
    fn test_reader_offset_wraparound() {
        let data = [3u16, 0, 1, 2, 7];
        let mut reader = Reader::new(&data);
        assert_eq!(reader.read_raw().unwrap(), 3);
        assert_eq!(reader.read().unwrap(), 0xFFFE);
        assert_eq!(reader.read().unwrap(), 0xFFFF);
        assert_eq!(reader.read().unwrap(), 0);
        assert_eq!(reader.read().unwrap(), 5);
        assert!(matches!(
            reader.read(),
            Err(DeserializeError::Truncated { offset: 5 })
        ));
    }

    #[test]
    fn test_bad_version_is_rejected() {
        let result = AtnDeserializer::default().deserialize(&[4]);
        assert!(matches!(
            result,
            Err(DeserializeError::BadVersion { found: 4, expected: 3 })
        ));
    }
}
