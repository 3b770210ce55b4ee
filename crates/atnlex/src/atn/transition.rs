//! Transition labels.
//!
//! Each transition carries the arena index of its target state. Epsilon-class
//! transitions (rule calls, predicates, actions, plain epsilon) are followed
//! during closure; labeled transitions (atom, range, set, wildcard) consume
//! one input symbol during reach.

use crate::atn::state::StateNumber;
use crate::interval::IntervalSet;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Epsilon {
        target: StateNumber,
        /// Rule index of the callee when this is a synthesized return edge
        /// out of a precedence rule invoked at precedence 0, else `-1`.
        outermost_precedence_return: i32,
    },
    /// Inclusive code-point range `lo..=hi` as decoded from the payload.
    Range {
        target: StateNumber,
        lo: i32,
        hi: i32,
    },
    Rule {
        /// The called rule's start state.
        target: StateNumber,
        /// State to continue from after the callee's rule-stop state.
        follow: StateNumber,
        rule_index: usize,
        precedence: i32,
    },
    Predicate {
        target: StateNumber,
        rule_index: usize,
        pred_index: usize,
        is_ctx_dependent: bool,
    },
    Atom {
        target: StateNumber,
        symbol: i32,
    },
    Action {
        target: StateNumber,
        rule_index: usize,
        action_index: usize,
        is_ctx_dependent: bool,
    },
    Set {
        target: StateNumber,
        set: Arc<IntervalSet>,
    },
    NotSet {
        target: StateNumber,
        set: Arc<IntervalSet>,
    },
    Wildcard {
        target: StateNumber,
    },
    PrecedencePredicate {
        target: StateNumber,
        precedence: i32,
    },
}

impl Transition {
    #[must_use]
    pub const fn target(&self) -> StateNumber {
        match *self {
            Self::Epsilon { target, .. }
            | Self::Range { target, .. }
            | Self::Rule { target, .. }
            | Self::Predicate { target, .. }
            | Self::Atom { target, .. }
            | Self::Action { target, .. }
            | Self::Set { target, .. }
            | Self::NotSet { target, .. }
            | Self::Wildcard { target }
            | Self::PrecedencePredicate { target, .. } => target,
        }
    }

    /// Epsilon-class transitions are followed without consuming input.
    #[must_use]
    pub const fn is_epsilon(&self) -> bool {
        matches!(
            self,
            Self::Epsilon { .. }
                | Self::Rule { .. }
                | Self::Predicate { .. }
                | Self::Action { .. }
                | Self::PrecedencePredicate { .. }
        )
    }

    /// Whether this transition matches `symbol` within the vocabulary
    /// `[min_vocab, max_vocab]` (inclusive bounds). Epsilon-class
    /// transitions never match.
    #[must_use]
    pub fn matches(&self, symbol: i32, min_vocab: i32, max_vocab: i32) -> bool {
        match self {
            Self::Range { lo, hi, .. } => *lo <= symbol && symbol <= *hi,
            Self::Atom { symbol: s, .. } => *s == symbol,
            Self::Set { set, .. } => set.contains(symbol),
            Self::NotSet { set, .. } => {
                symbol >= min_vocab && symbol <= max_vocab && !set.contains(symbol)
            }
            Self::Wildcard { .. } => symbol >= min_vocab && symbol <= max_vocab,
            _ => false,
        }
    }
}
