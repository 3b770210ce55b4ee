//! # Lazily Materialized DFA
//!
//! One DFA per lexer mode, built on the fly out of ATN config sets. States
//! are interned under the context-ignoring config-set equality (see
//! [`crate::config`]), frozen at insertion, and shared by every lexer
//! instance generated from the grammar. A process-wide sentinel state marks
//! known-dead edges so repeated dead characters skip the ATN entirely.
//!
//! ## Concurrency
//!
//! The tables follow the coarse-lock baseline: `RwLock` around the state
//! table, `s0`, and each state's edge vector. An interned state's identity
//! and contents never change, and an edge write never replaces a non-null
//! edge, so readers may cache `Arc`s freely.

use crate::action::LexerActionExecutor;
use crate::atn::Atn;
use crate::config::{dfa_key_eq, dfa_key_hash, AtnConfigSet};
use crate::context::SharedContextCache;
use hashbrown::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock, RwLock};

/// Smallest code unit cached in DFA edge tables.
pub const MIN_DFA_EDGE: i32 = 0;
/// Largest code unit cached in DFA edge tables. Symbols above this window
/// (the bulk of Unicode) fall back to an ATN computation per occurrence;
/// the window stays narrow because edge arrays are allocated per state.
pub const MAX_DFA_EDGE: i32 = 127;

/// An interned DFA state. Immutable after insertion apart from its edge
/// table, which only ever gains entries.
#[derive(Debug)]
pub struct DfaState {
    /// Insertion-order id within its DFA; `usize::MAX` for the error
    /// sentinel.
    pub state_number: usize,
    /// The frozen closure this state was interned from.
    pub configs: Arc<AtnConfigSet>,
    pub is_accept: bool,
    /// Token type predicted when accepting, `0` otherwise.
    pub prediction: i32,
    /// Action executor of the accepting configuration, if any.
    pub lexer_action_executor: Option<Arc<LexerActionExecutor>>,
    edges: RwLock<Vec<Option<Arc<DfaState>>>>,
}

impl DfaState {
    fn new(
        state_number: usize,
        configs: Arc<AtnConfigSet>,
        is_accept: bool,
        prediction: i32,
        lexer_action_executor: Option<Arc<LexerActionExecutor>>,
    ) -> Self {
        Self {
            state_number,
            configs,
            is_accept,
            prediction,
            lexer_action_executor,
            edges: RwLock::new(Vec::new()),
        }
    }

    /// The shared "known dead" sentinel.
    #[must_use]
    pub fn error_sentinel() -> &'static Arc<DfaState> {
        static ERROR: OnceLock<Arc<DfaState>> = OnceLock::new();
        ERROR.get_or_init(|| {
            let mut configs = AtnConfigSet::new();
            configs.set_read_only(true);
            Arc::new(DfaState::new(usize::MAX, Arc::new(configs), false, 0, None))
        })
    }

    #[must_use]
    pub fn is_error_sentinel(&self) -> bool {
        self.state_number == usize::MAX
    }

    /// Cached successor under `symbol`, if the edge window covers it and an
    /// edge has been installed.
    #[must_use]
    pub fn edge(&self, symbol: i32) -> Option<Arc<DfaState>> {
        if !(MIN_DFA_EDGE..=MAX_DFA_EDGE).contains(&symbol) {
            return None;
        }
        let edges = self.edges.read().expect("edge table poisoned");
        edges
            .get((symbol - MIN_DFA_EDGE) as usize)
            .and_then(Clone::clone)
    }

    /// Install the edge `self --symbol--> target`. Writes are monotone: an
    /// existing edge is never replaced.
    pub fn set_edge(&self, symbol: i32, target: Arc<DfaState>) {
        if !(MIN_DFA_EDGE..=MAX_DFA_EDGE).contains(&symbol) {
            return;
        }
        let slot = (symbol - MIN_DFA_EDGE) as usize;
        let mut edges = self.edges.write().expect("edge table poisoned");
        if edges.len() <= slot {
            edges.resize(slot + 1, None);
        }
        if edges[slot].is_none() {
            edges[slot] = Some(target);
        }
    }
}

/// State-table key: a frozen config set hashed/compared ignoring contexts.
#[derive(Debug, Clone)]
struct DfaKey(Arc<AtnConfigSet>);

impl PartialEq for DfaKey {
    fn eq(&self, other: &Self) -> bool {
        dfa_key_eq(&self.0, &other.0)
    }
}

impl Eq for DfaKey {}

impl Hash for DfaKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        dfa_key_hash(&self.0, state);
    }
}

/// The DFA of one lexer mode.
#[derive(Debug)]
pub struct Dfa {
    pub mode: usize,
    states: RwLock<HashMap<DfaKey, Arc<DfaState>, ahash::RandomState>>,
    s0: RwLock<Option<Arc<DfaState>>>,
}

impl Dfa {
    #[must_use]
    pub fn new(mode: usize) -> Self {
        Self {
            mode,
            states: RwLock::new(HashMap::default()),
            s0: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn s0(&self) -> Option<Arc<DfaState>> {
        self.s0.read().expect("dfa poisoned").clone()
    }

    /// Publish the start state. First writer wins.
    pub fn set_s0(&self, state: Arc<DfaState>) {
        let mut s0 = self.s0.write().expect("dfa poisoned");
        if s0.is_none() {
            *s0 = Some(state);
        }
    }

    /// Intern a state built from `configs` (already frozen). Returns the
    /// existing state when an equivalent one is present, assigning state
    /// numbers in insertion order otherwise.
    pub fn add_state(
        &self,
        configs: Arc<AtnConfigSet>,
        is_accept: bool,
        prediction: i32,
        lexer_action_executor: Option<Arc<LexerActionExecutor>>,
    ) -> Arc<DfaState> {
        debug_assert!(configs.is_read_only());
        let key = DfaKey(configs.clone());
        let mut states = self.states.write().expect("dfa poisoned");
        if let Some(existing) = states.get(&key) {
            return existing.clone();
        }
        let state = Arc::new(DfaState::new(
            states.len(),
            configs,
            is_accept,
            prediction,
            lexer_action_executor,
        ));
        states.insert(key, state.clone());
        state
    }

    /// Number of interned states.
    #[must_use]
    pub fn state_count(&self) -> usize {
        self.states.read().expect("dfa poisoned").len()
    }
}

/// Everything shared across lexer instances generated from one grammar: the
/// transition network, one DFA per mode, and the context interning table.
/// Created once per generated lexer class and handed to each instance
/// behind an `Arc`.
#[derive(Debug)]
pub struct CompiledAtn {
    pub atn: Arc<Atn>,
    dfas: Vec<Dfa>,
    pub context_cache: SharedContextCache,
}

impl CompiledAtn {
    #[must_use]
    pub fn new(atn: Arc<Atn>) -> Self {
        let dfas = (0..atn.mode_count().max(1)).map(Dfa::new).collect();
        Self {
            atn,
            dfas,
            context_cache: SharedContextCache::new(),
        }
    }

    #[must_use]
    pub fn dfa(&self, mode: usize) -> &Dfa {
        &self.dfas[mode]
    }

    #[must_use]
    pub fn dfas(&self) -> &[Dfa] {
        &self.dfas
    }
}
