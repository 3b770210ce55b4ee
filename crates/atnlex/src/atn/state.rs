//! ATN state nodes.
//!
//! States live in the arena owned by [`crate::atn::Atn`] and reference each
//! other by arena index. Back-pointers (`loop_back`, `end_state`, ...) are
//! patched in a second pass after all states are allocated, so they are
//! `Option<usize>` until deserialization completes.

use crate::atn::transition::Transition;
use smallvec::SmallVec;

/// Arena index of an ATN state.
pub type StateNumber = usize;

/// The structural role of a state in the transition network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtnStateKind {
    Basic,
    RuleStart {
        stop_state: Option<StateNumber>,
        /// Set for the start states of precedence (left-recursive) rules.
        is_precedence_rule: bool,
    },
    BlockStart {
        end_state: Option<StateNumber>,
    },
    PlusBlockStart {
        end_state: Option<StateNumber>,
        loop_back: Option<StateNumber>,
    },
    StarBlockStart {
        end_state: Option<StateNumber>,
    },
    TokenStart,
    RuleStop,
    BlockEnd {
        start_state: Option<StateNumber>,
    },
    StarLoopBack,
    StarLoopEntry {
        loop_back: Option<StateNumber>,
        is_precedence_decision: bool,
    },
    PlusLoopBack,
    LoopEnd {
        loop_back: Option<StateNumber>,
    },
}

impl AtnStateKind {
    /// Whether this kind of state makes a prediction decision.
    #[must_use]
    pub const fn is_decision(&self) -> bool {
        matches!(
            self,
            Self::BlockStart { .. }
                | Self::PlusBlockStart { .. }
                | Self::StarBlockStart { .. }
                | Self::TokenStart
                | Self::StarLoopEntry { .. }
                | Self::PlusLoopBack
        )
    }

    #[must_use]
    pub const fn is_block_start(&self) -> bool {
        matches!(
            self,
            Self::BlockStart { .. } | Self::PlusBlockStart { .. } | Self::StarBlockStart { .. }
        )
    }
}

/// One node of the transition network.
#[derive(Debug, Clone, PartialEq)]
pub struct AtnState {
    /// Arena index of this state; equal to its position in `Atn::states`.
    pub number: StateNumber,
    pub kind: AtnStateKind,
    /// Index of the rule this state belongs to, `-1` if none.
    pub rule_index: i32,
    pub transitions: SmallVec<[Transition; 2]>,
    /// True iff every outgoing transition is epsilon-class. Maintained by
    /// [`AtnState::add_transition`].
    pub epsilon_only_transitions: bool,
    /// Non-greedy decision flag; meaningful only on decision states.
    pub non_greedy: bool,
    /// Decision index, `-1` if this state is not a registered decision.
    pub decision: i32,
}

impl AtnState {
    #[must_use]
    pub fn new(number: StateNumber, kind: AtnStateKind, rule_index: i32) -> Self {
        Self {
            number,
            kind,
            rule_index,
            transitions: SmallVec::new(),
            epsilon_only_transitions: false,
            non_greedy: false,
            decision: -1,
        }
    }

    /// Append an outgoing transition, keeping the epsilon-only flag in sync.
    pub fn add_transition(&mut self, transition: Transition) {
        if self.transitions.is_empty() {
            self.epsilon_only_transitions = transition.is_epsilon();
        } else if !transition.is_epsilon() {
            self.epsilon_only_transitions = false;
        }
        self.transitions.push(transition);
    }

    #[must_use]
    pub fn is_rule_stop(&self) -> bool {
        matches!(self.kind, AtnStateKind::RuleStop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epsilon_only_tracking() {
        let mut state = AtnState::new(0, AtnStateKind::Basic, 0);
        state.add_transition(Transition::Epsilon {
            target: 1,
            outermost_precedence_return: -1,
        });
        assert!(state.epsilon_only_transitions);
        state.add_transition(Transition::Atom { target: 2, symbol: 97 });
        assert!(!state.epsilon_only_transitions);
    }

    #[test]
    fn test_decision_kinds() {
        assert!(AtnStateKind::TokenStart.is_decision());
        assert!(AtnStateKind::PlusLoopBack.is_decision());
        assert!(AtnStateKind::StarLoopEntry {
            loop_back: None,
            is_precedence_decision: false
        }
        .is_decision());
        assert!(!AtnStateKind::Basic.is_decision());
        assert!(!AtnStateKind::RuleStop.is_decision());
    }
}
