//! # Augmented Transition Network
//!
//! The in-memory NFA deserialized from a generator-produced payload: one
//! start state per lexer mode, one start/stop state pair per rule, and
//! transitions labeled with interval sets, epsilon moves, rule calls,
//! predicates and actions.
//!
//! ## Overview
//!
//! The graph is immutable once [`deserializer::AtnDeserializer`] has built
//! it. States live in a contiguous arena indexed by state number, and
//! transitions reference their targets by index, so cycles need no interior
//! mutability. One `Atn` is created per generated lexer class and shared by
//! every lexer instance (see [`crate::dfa::CompiledAtn`]).

pub mod deserializer;
pub mod state;
pub mod transition;

pub use deserializer::{AtnDeserializer, DeserializeOptions};
pub use state::{AtnState, AtnStateKind, StateNumber};
pub use transition::Transition;

use crate::action::LexerAction;

/// Smallest code point matched by lexer rules.
pub const MIN_CHAR_VALUE: i32 = 0;
/// Largest code point matched by lexer rules.
pub const MAX_CHAR_VALUE: i32 = 0x10FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrammarType {
    Lexer,
    Parser,
}

/// The deserialized transition network. Immutable once built.
#[derive(Debug, PartialEq)]
pub struct Atn {
    pub grammar_type: GrammarType,
    pub max_token_type: i32,
    /// State arena; `states[n].number == n`.
    pub states: Vec<AtnState>,
    /// Start state of each rule, indexed by rule number.
    pub rule_to_start_state: Vec<StateNumber>,
    /// Stop state of each rule, indexed by rule number.
    pub rule_to_stop_state: Vec<StateNumber>,
    /// Token type emitted by each lexer rule (`-1` for EOF). Empty for
    /// parser grammars.
    pub rule_to_token_type: Vec<i32>,
    /// Start state of each lexer mode, indexed by mode number.
    pub mode_to_start_state: Vec<StateNumber>,
    /// Decision states in decision-index order.
    pub decision_to_state: Vec<StateNumber>,
    /// Decoded lexer action table, indexed by serialized action index.
    pub lexer_actions: Vec<LexerAction>,
}

impl Atn {
    #[must_use]
    pub fn state(&self, number: StateNumber) -> &AtnState {
        &self.states[number]
    }

    #[must_use]
    pub fn mode_count(&self) -> usize {
        self.mode_to_start_state.len()
    }

    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rule_to_start_state.len()
    }
}
