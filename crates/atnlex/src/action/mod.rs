//! # Lexer Actions
//!
//! Side effects attached to lexer rules (`-> skip`, `-> channel(...)`,
//! `-> pushMode(...)`, embedded `{...}` code, ...), decoded once from the
//! serialized payload and queued during simulation.
//!
//! Actions execute only after a match is decided, against the host's mutable
//! state. Actions that sit in the middle of a rule are position dependent:
//! before their executor is cached inside a DFA state, their input offset is
//! frozen with [`LexerActionExecutor::fix_offset_before_match`] so executors
//! with identical frozen action lists compare equal across input positions.

use crate::lexer::LexerHost;
use crate::stream::CharStream;
use smallvec::SmallVec;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// One decoded lexer action. Parameterized singletons in the ATN's action
/// table; `IndexedCustom` only ever appears inside executors, wrapping a
/// position-dependent action whose offset has been frozen.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LexerAction {
    Channel(u32),
    Custom { rule_index: usize, action_index: usize },
    Mode(usize),
    More,
    PopMode,
    PushMode(usize),
    Skip,
    Type(i32),
    IndexedCustom { offset: usize, action: Box<LexerAction> },
}

impl LexerAction {
    /// Position-dependent actions must run with the input positioned where
    /// they appeared inside the match.
    #[must_use]
    pub fn is_position_dependent(&self) -> bool {
        matches!(self, Self::Custom { .. } | Self::IndexedCustom { .. })
    }

    fn execute<H: LexerHost + ?Sized>(&self, host: &mut H) {
        match *self {
            Self::Channel(channel) => host.set_channel(channel),
            Self::Custom { rule_index, action_index } => {
                host.custom_action(rule_index, action_index);
            }
            Self::Mode(mode) => host.set_mode(mode),
            Self::More => host.more(),
            Self::PopMode => host.pop_mode(),
            Self::PushMode(mode) => host.push_mode(mode),
            Self::Skip => host.skip(),
            Self::Type(token_type) => host.set_type(token_type),
            Self::IndexedCustom { ref action, .. } => action.execute(host),
        }
    }
}

/// An immutable, ordered list of lexer actions with a precomputed hash.
///
/// Executors are shared through `Arc` and compared element-wise; two
/// executors are equal iff their action sequences are equal.
#[derive(Debug)]
pub struct LexerActionExecutor {
    actions: SmallVec<[LexerAction; 2]>,
    hash: u64,
}

impl LexerActionExecutor {
    #[must_use]
    pub fn new(actions: SmallVec<[LexerAction; 2]>) -> Arc<Self> {
        let mut hasher = std::hash::DefaultHasher::new();
        actions.hash(&mut hasher);
        let hash = hasher.finish();
        Arc::new(Self { actions, hash })
    }

    /// Extend `previous` with one more action, preserving order. A `None`
    /// previous executor yields a single-action executor.
    #[must_use]
    pub fn append(previous: Option<&Arc<Self>>, action: LexerAction) -> Arc<Self> {
        match previous {
            None => Self::new(SmallVec::from_iter([action])),
            Some(executor) => {
                let mut actions = executor.actions.clone();
                actions.push(action);
                Self::new(actions)
            }
        }
    }

    /// Freeze the input offset of every position-dependent action that does
    /// not carry one yet. Returns the same executor when nothing changed.
    #[must_use]
    pub fn fix_offset_before_match(executor: &Arc<Self>, offset: usize) -> Arc<Self> {
        let needs_fix = executor.actions.iter().any(|action| {
            action.is_position_dependent()
                && !matches!(action, LexerAction::IndexedCustom { .. })
        });
        if !needs_fix {
            return executor.clone();
        }
        let actions = executor
            .actions
            .iter()
            .map(|action| {
                if action.is_position_dependent()
                    && !matches!(action, LexerAction::IndexedCustom { .. })
                {
                    LexerAction::IndexedCustom {
                        offset,
                        action: Box::new(action.clone()),
                    }
                } else {
                    action.clone()
                }
            })
            .collect();
        Self::new(actions)
    }

    #[must_use]
    pub fn actions(&self) -> &[LexerAction] {
        &self.actions
    }

    /// Run every queued action in order. `start_index` is the index of the
    /// first matched code point; the input is positioned at the accept
    /// index. Position-dependent actions see the input seeked to their
    /// recorded position; the accept position is restored afterwards.
    pub fn execute<H, S>(&self, host: &mut H, input: &mut S, start_index: usize)
    where
        H: LexerHost + ?Sized,
        S: CharStream + ?Sized,
    {
        let stop_index = input.index();
        let mut requires_seek = false;
        for action in &self.actions {
            match action {
                LexerAction::IndexedCustom { offset, action } => {
                    let target = start_index + offset;
                    input.seek(target);
                    requires_seek = target != stop_index;
                    action.execute(host);
                }
                action if action.is_position_dependent() => {
                    input.seek(stop_index);
                    requires_seek = false;
                    action.execute(host);
                }
                action => action.execute(host),
            }
        }
        if requires_seek {
            input.seek(stop_index);
        }
    }
}

impl PartialEq for LexerActionExecutor {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.actions == other.actions
    }
}

impl Eq for LexerActionExecutor {}

impl Hash for LexerActionExecutor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_to_none() {
        let executor = LexerActionExecutor::append(None, LexerAction::Skip);
        assert_eq!(executor.actions(), &[LexerAction::Skip]);
    }

    #[test]
    fn test_append_preserves_order() {
        let first = LexerActionExecutor::append(None, LexerAction::Channel(1));
        let second = LexerActionExecutor::append(Some(&first), LexerAction::PopMode);
        assert_eq!(
            second.actions(),
            &[LexerAction::Channel(1), LexerAction::PopMode]
        );
        assert_eq!(first.actions().len(), 1);
    }

    #[test]
    fn test_executor_equality_is_element_wise() {
        let a = LexerActionExecutor::append(None, LexerAction::Mode(2));
        let b = LexerActionExecutor::append(None, LexerAction::Mode(2));
        assert_eq!(*a, *b);
        let c = LexerActionExecutor::append(None, LexerAction::Mode(3));
        assert_ne!(*a, *c);
    }

    #[test]
    fn test_fix_offset_identity_without_custom_actions() {
        let executor = LexerActionExecutor::append(None, LexerAction::Skip);
        let fixed = LexerActionExecutor::fix_offset_before_match(&executor, 4);
        assert!(Arc::ptr_eq(&executor, &fixed));
    }

    #[test]
    fn test_fix_offset_wraps_custom_once() {
        let executor = LexerActionExecutor::append(
            None,
            LexerAction::Custom { rule_index: 0, action_index: 1 },
        );
        let fixed = LexerActionExecutor::fix_offset_before_match(&executor, 4);
        assert_eq!(
            fixed.actions(),
            &[LexerAction::IndexedCustom {
                offset: 4,
                action: Box::new(LexerAction::Custom { rule_index: 0, action_index: 1 }),
            }]
        );
        // A second fix does not rewrap, so equal frozen executors stay equal.
        let refixed = LexerActionExecutor::fix_offset_before_match(&fixed, 9);
        assert!(Arc::ptr_eq(&fixed, &refixed));
    }
}
