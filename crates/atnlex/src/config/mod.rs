//! # ATN Configurations
//!
//! A configuration is one live thread of the simulation: an ATN state, the
//! alternative it is pursuing, the rule-call stack that got it there, and
//! the actions queued along the way.
//!
//! Configurations carry two notions of equality. Inside an [`AtnConfigSet`]
//! the full tuple counts, context included, so distinct stacks stay
//! distinct during closure. When config sets are compared to unify DFA
//! states, the context is ignored: configurations differing only in stack
//! collapse into one DFA state, which is what keeps the number of DFA
//! states finite. The two modes are realized as two container keyings (the
//! set's lookup table vs. [`dfa_key_hash`]/[`dfa_key_eq`]), never as a
//! mutable flag on the config.

use crate::action::LexerActionExecutor;
use crate::atn::state::StateNumber;
use crate::context::PredictionContext;
use hashbrown::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// One simulation thread: `(state, alt, context, executor, non-greedy mark)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LexerAtnConfig {
    pub state: StateNumber,
    pub alt: u32,
    pub context: Arc<PredictionContext>,
    pub lexer_action_executor: Option<Arc<LexerActionExecutor>>,
    /// True once this thread has stepped through a non-greedy decision
    /// state; such threads lose to any sibling of the same alternative that
    /// already reached an accept state.
    pub passed_through_non_greedy: bool,
}

impl LexerAtnConfig {
    #[must_use]
    pub fn new(state: StateNumber, alt: u32, context: Arc<PredictionContext>) -> Self {
        Self {
            state,
            alt,
            context,
            lexer_action_executor: None,
            passed_through_non_greedy: false,
        }
    }

    /// Derive a config at `state`, keeping stack and executor.
    #[must_use]
    pub fn transit(&self, state: StateNumber, passed_non_greedy: bool) -> Self {
        Self {
            state,
            alt: self.alt,
            context: self.context.clone(),
            lexer_action_executor: self.lexer_action_executor.clone(),
            passed_through_non_greedy: self.passed_through_non_greedy || passed_non_greedy,
        }
    }

    /// Derive a config at `state` with a replaced rule-call stack.
    #[must_use]
    pub fn with_context(
        &self,
        state: StateNumber,
        context: Arc<PredictionContext>,
        passed_non_greedy: bool,
    ) -> Self {
        Self {
            state,
            alt: self.alt,
            context,
            lexer_action_executor: self.lexer_action_executor.clone(),
            passed_through_non_greedy: self.passed_through_non_greedy || passed_non_greedy,
        }
    }

    /// Derive a config at `state` with a replaced action executor.
    #[must_use]
    pub fn with_executor(
        &self,
        state: StateNumber,
        executor: Option<Arc<LexerActionExecutor>>,
        passed_non_greedy: bool,
    ) -> Self {
        Self {
            state,
            alt: self.alt,
            context: self.context.clone(),
            lexer_action_executor: executor,
            passed_through_non_greedy: self.passed_through_non_greedy || passed_non_greedy,
        }
    }
}

/// Hash one config the way DFA-state unification sees it: context ignored.
fn dfa_config_hash<H: Hasher>(config: &LexerAtnConfig, state: &mut H) {
    state.write_usize(config.state);
    state.write_u32(config.alt);
    config.lexer_action_executor.hash(state);
    state.write_u8(u8::from(config.passed_through_non_greedy));
}

fn dfa_config_eq(a: &LexerAtnConfig, b: &LexerAtnConfig) -> bool {
    a.state == b.state
        && a.alt == b.alt
        && a.lexer_action_executor == b.lexer_action_executor
        && a.passed_through_non_greedy == b.passed_through_non_greedy
}

/// Hash a whole config set under DFA-state equality.
pub fn dfa_key_hash<H: Hasher>(configs: &AtnConfigSet, state: &mut H) {
    state.write_usize(configs.len());
    for config in configs.iter() {
        dfa_config_hash(config, state);
    }
}

/// Compare two config sets under DFA-state equality.
#[must_use]
pub fn dfa_key_eq(a: &AtnConfigSet, b: &AtnConfigSet) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|(x, y)| dfa_config_eq(x, y))
}

/// An ordered set of configurations with a full-equality lookup table.
///
/// Insertion order is preserved; it encodes alternative priority for the
/// longest-match / first-rule-wins arbitration. Once interned into a DFA
/// state the set is frozen; mutating a frozen set is an implementation bug
/// and panics.
#[derive(Debug, Default)]
pub struct AtnConfigSet {
    configs: Vec<LexerAtnConfig>,
    lookup: HashSet<LexerAtnConfig, ahash::RandomState>,
    /// Set when any predicate transition was evaluated while computing this
    /// set; predicate-tainted sets must not be reachable through cached DFA
    /// edges.
    pub has_semantic_context: bool,
    read_only: bool,
}

impl AtnConfigSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a configuration. Duplicates under full equality merge their
    /// (equal) contexts, leaving the set unchanged. Returns whether the set
    /// grew.
    ///
    /// # Panics
    ///
    /// Panics if the set has been frozen with [`AtnConfigSet::set_read_only`].
    pub fn add(&mut self, config: LexerAtnConfig) -> bool {
        assert!(!self.read_only, "cannot add to a frozen config set");
        if !self.lookup.insert(config.clone()) {
            return false;
        }
        self.configs.push(config);
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LexerAtnConfig> {
        self.configs.iter()
    }

    #[must_use]
    pub fn configs(&self) -> &[LexerAtnConfig] {
        &self.configs
    }

    /// Replace every config's context through `f` (used to canonicalize
    /// contexts against the shared cache before freezing).
    ///
    /// # Panics
    ///
    /// Panics if the set has been frozen.
    pub fn map_contexts<F>(&mut self, mut f: F)
    where
        F: FnMut(&Arc<PredictionContext>) -> Arc<PredictionContext>,
    {
        assert!(!self.read_only, "cannot rewrite a frozen config set");
        for config in &mut self.configs {
            config.context = f(&config.context);
        }
    }

    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
        if read_only {
            // The lookup table is only needed while building.
            self.lookup.clear();
            self.lookup.shrink_to_fit();
        }
    }
}

impl PartialEq for AtnConfigSet {
    fn eq(&self, other: &Self) -> bool {
        self.configs == other.configs
    }
}

impl Eq for AtnConfigSet {}
