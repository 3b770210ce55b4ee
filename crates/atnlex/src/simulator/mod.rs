//! # Lexer ATN Simulator
//!
//! The adaptive matching loop: walk the mode's DFA while it has answers,
//! fall back to ATN closure/reach computation to grow the DFA, remember the
//! last accept point, and on a dead end rewind to it, run the queued
//! actions, and report the matched token type.
//!
//! ## Overview
//!
//! One simulator instance belongs to one lexer instance and carries the
//! per-instance state (line, column, mode, the per-match accept scratch).
//! Everything heavy (the ATN, the per-mode DFAs, the context interning
//! table) lives in the shared [`CompiledAtn`] and is safe under concurrent
//! readers.
//!
//! Two details keep the DFA cache sound in the presence of predicates and
//! mid-rule actions:
//!
//! - a config set computed under a predicate is tainted
//!   (`has_semantic_context`); its DFA state is interned but never made
//!   reachable through a cached edge, so predicates are re-evaluated on
//!   every visit;
//! - a position-dependent action has its input offset frozen before its
//!   executor is cached, so executors compare equal across input positions
//!   and do not multiply DFA states.

use crate::action::LexerActionExecutor;
use crate::atn::state::StateNumber;
use crate::atn::{Transition, MAX_CHAR_VALUE, MIN_CHAR_VALUE};
use crate::config::{AtnConfigSet, LexerAtnConfig};
use crate::context::{get_cached_context, PredictionContext, VisitedContexts, EMPTY_RETURN_STATE};
use crate::dfa::{CompiledAtn, DfaState};
use crate::error::NoViableAltError;
use crate::lexer::{LexerHost, TOKEN_EOF};
use crate::stream::{CharStream, EOF};
use std::sync::Arc;
use tracing::{debug, trace};

/// Scratch record for the most recent accept point within one `match`.
#[derive(Debug, Default, Clone)]
struct SimState {
    index: usize,
    line: u32,
    column: u32,
    dfa_state: Option<Arc<DfaState>>,
}

impl SimState {
    fn reset(&mut self) {
        self.index = 0;
        self.line = 0;
        self.column = 0;
        self.dfa_state = None;
    }
}

/// Counters for one simulator instance.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimMetrics {
    pub match_calls: usize,
    /// Steps answered by a cached DFA edge.
    pub dfa_hits: usize,
    /// Steps that required an ATN reach/closure computation.
    pub atn_computations: usize,
    pub dfa_states_created: usize,
}

/// The per-instance simulator. See the module docs.
pub struct LexerAtnSimulator {
    shared: Arc<CompiledAtn>,
    line: u32,
    column: u32,
    mode: usize,
    start_index: usize,
    prev_accept: SimState,
    metrics: SimMetrics,
}

impl LexerAtnSimulator {
    #[must_use]
    pub fn new(shared: Arc<CompiledAtn>) -> Self {
        Self {
            shared,
            line: 1,
            column: 0,
            mode: 0,
            start_index: 0,
            prev_accept: SimState::default(),
            metrics: SimMetrics::default(),
        }
    }

    /// 1-based line of the next code point to be consumed.
    #[must_use]
    pub const fn line(&self) -> u32 {
        self.line
    }

    /// 0-based column of the next code point to be consumed.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    #[must_use]
    pub const fn metrics(&self) -> SimMetrics {
        self.metrics
    }

    #[must_use]
    pub fn shared(&self) -> &Arc<CompiledAtn> {
        &self.shared
    }

    /// Match one token in `mode` starting at the current input position.
    ///
    /// On success the input stands just past the matched text and every
    /// queued action has run. On failure the input is rewound to the match
    /// start; line, column and mode keep the values they had when the last
    /// successful character was consumed.
    ///
    /// # Errors
    ///
    /// Returns [`NoViableAltError`] when no accept state was captured
    /// before the simulation hit a dead end.
    pub fn match_token<S, H>(
        &mut self,
        input: &mut S,
        host: &mut H,
        mode: usize,
    ) -> Result<i32, NoViableAltError>
    where
        S: CharStream + ?Sized,
        H: LexerHost + ?Sized,
    {
        self.metrics.match_calls += 1;
        self.mode = mode;
        let marker = input.mark();
        self.start_index = input.index();
        self.prev_accept.reset();
        trace!(mode, start = self.start_index, "match");
        let shared = self.shared.clone();
        let result = match shared.dfa(mode).s0() {
            Some(s0) => self.exec_atn(input, host, s0),
            None => self.match_atn(input, host),
        };
        input.release(marker);
        result
    }

    /// Advance the input, maintaining line/column.
    pub fn consume<S: CharStream + ?Sized>(&mut self, input: &mut S) {
        let current = input.la(1);
        if current == i32::from(b'\n') {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        input.consume();
    }

    /// First match in a mode: compute the start closure, intern it, and
    /// publish it as the DFA start state unless predicates tainted it.
    fn match_atn<S, H>(&mut self, input: &mut S, host: &mut H) -> Result<i32, NoViableAltError>
    where
        S: CharStream + ?Sized,
        H: LexerHost + ?Sized,
    {
        let shared = self.shared.clone();
        let start_state = shared.atn.mode_to_start_state[self.mode];
        let mut s0_closure = AtnConfigSet::new();
        self.compute_start_state(input, host, start_state, &mut s0_closure);
        let suppress_edge = s0_closure.has_semantic_context;
        s0_closure.has_semantic_context = false;
        let next = self.add_dfa_state(s0_closure);
        if !suppress_edge {
            shared.dfa(self.mode).set_s0(next.clone());
        }
        self.exec_atn(input, host, next)
    }

    fn exec_atn<S, H>(
        &mut self,
        input: &mut S,
        host: &mut H,
        s0: Arc<DfaState>,
    ) -> Result<i32, NoViableAltError>
    where
        S: CharStream + ?Sized,
        H: LexerHost + ?Sized,
    {
        if s0.is_accept {
            // Zero-length tokens: the start state may already accept.
            self.capture_sim_state(input, &s0);
        }
        let mut t = input.la(1);
        let mut s = s0;
        loop {
            let target = match s.edge(t) {
                Some(existing) => {
                    self.metrics.dfa_hits += 1;
                    existing
                }
                None => self.compute_target_state(input, host, &s, t),
            };
            if target.is_error_sentinel() {
                break;
            }
            // EOF is never consumed; everything else updates line/column
            // before the accept point for this character is captured.
            if t != EOF {
                self.consume(input);
            }
            if target.is_accept {
                self.capture_sim_state(input, &target);
                if t == EOF {
                    break;
                }
            }
            t = input.la(1);
            s = target;
        }
        self.fail_or_accept(input, host, &s, t)
    }

    /// One-symbol reach from `s` plus closure, interned into the DFA. Dead
    /// ends cache an edge to the error sentinel unless predicates were
    /// involved, in which case the edge stays uncached so the predicate is
    /// re-evaluated next time.
    fn compute_target_state<S, H>(
        &mut self,
        input: &mut S,
        host: &mut H,
        s: &Arc<DfaState>,
        t: i32,
    ) -> Arc<DfaState>
    where
        S: CharStream + ?Sized,
        H: LexerHost + ?Sized,
    {
        self.metrics.atn_computations += 1;
        let mut reach = AtnConfigSet::new();
        let closure_configs = s.configs.clone();
        self.reach(input, host, &closure_configs, &mut reach, t);
        if reach.is_empty() {
            if !reach.has_semantic_context {
                s.set_edge(t, DfaState::error_sentinel().clone());
            }
            return DfaState::error_sentinel().clone();
        }
        let suppress_edge = reach.has_semantic_context;
        reach.has_semantic_context = false;
        let target = self.add_dfa_state(reach);
        if !suppress_edge {
            s.set_edge(t, target.clone());
        }
        target
    }

    /// The configurations reachable from `closure_configs` under symbol
    /// `t`. Longest-match/first-alt arbitration: once any configuration of
    /// an alternative reaches an accept state, later configurations of that
    /// alternative that passed through a non-greedy decision are dropped.
    fn reach<S, H>(
        &mut self,
        input: &mut S,
        host: &mut H,
        closure_configs: &Arc<AtnConfigSet>,
        reach: &mut AtnConfigSet,
        t: i32,
    ) where
        S: CharStream + ?Sized,
        H: LexerHost + ?Sized,
    {
        let shared = self.shared.clone();
        let mut skip_alt = 0u32;
        for config in closure_configs.iter() {
            let current_alt_reached_accept = config.alt == skip_alt;
            if current_alt_reached_accept && config.passed_through_non_greedy {
                continue;
            }
            for transition in &shared.atn.state(config.state).transitions {
                if !transition.matches(t, MIN_CHAR_VALUE, MAX_CHAR_VALUE) {
                    continue;
                }
                let executor = config.lexer_action_executor.as_ref().map(|e| {
                    LexerActionExecutor::fix_offset_before_match(
                        e,
                        input.index() - self.start_index,
                    )
                });
                let target = transition.target();
                let next = config.with_executor(
                    target,
                    executor,
                    self.non_greedy_decision(target),
                );
                let treat_eof_as_epsilon = t == EOF;
                if self.closure(
                    input,
                    host,
                    next,
                    reach,
                    current_alt_reached_accept,
                    true,
                    treat_eof_as_epsilon,
                ) {
                    // Later configs of this alt that passed through a
                    // non-greedy decision lose to the accept just found.
                    skip_alt = config.alt;
                }
            }
        }
    }

    /// Epsilon-expand `config` into `configs`, popping and pushing GSS
    /// frames at rule boundaries. Returns whether an accept state was
    /// reached by this config or any of its descendants.
    #[allow(clippy::too_many_arguments)]
    fn closure<S, H>(
        &mut self,
        input: &mut S,
        host: &mut H,
        config: LexerAtnConfig,
        configs: &mut AtnConfigSet,
        mut current_alt_reached_accept: bool,
        speculative: bool,
        treat_eof_as_epsilon: bool,
    ) -> bool
    where
        S: CharStream + ?Sized,
        H: LexerHost + ?Sized,
    {
        let shared = self.shared.clone();
        let state = shared.atn.state(config.state);

        if state.is_rule_stop() {
            trace!(state = config.state, "closure at rule stop");
            if config.context.is_empty() {
                configs.add(config);
                return true;
            }
            if config.context.has_empty_path() {
                let collapsed =
                    config.with_context(config.state, PredictionContext::empty(), false);
                configs.add(collapsed);
                current_alt_reached_accept = true;
            }
            for i in 0..config.context.len() {
                let return_state = config.context.return_state(i);
                if return_state == EMPTY_RETURN_STATE {
                    continue;
                }
                let parent = config
                    .context
                    .parent(i)
                    .expect("non-root frame has a parent")
                    .clone();
                let return_to = return_state as StateNumber;
                let popped = config.with_context(
                    return_to,
                    parent,
                    self.non_greedy_decision(return_to),
                );
                current_alt_reached_accept = self.closure(
                    input,
                    host,
                    popped,
                    configs,
                    current_alt_reached_accept,
                    speculative,
                    treat_eof_as_epsilon,
                );
            }
            return current_alt_reached_accept;
        }

        if !state.epsilon_only_transitions
            && (!current_alt_reached_accept || !config.passed_through_non_greedy)
        {
            configs.add(config.clone());
        }

        for transition in &state.transitions {
            if let Some(next) = self.get_epsilon_target(
                input,
                host,
                &config,
                transition,
                configs,
                speculative,
                treat_eof_as_epsilon,
            ) {
                current_alt_reached_accept = self.closure(
                    input,
                    host,
                    next,
                    configs,
                    current_alt_reached_accept,
                    speculative,
                    treat_eof_as_epsilon,
                );
            }
        }
        current_alt_reached_accept
    }

    /// Step `config` across one epsilon-class transition, if it applies.
    ///
    /// # Panics
    ///
    /// Panics on a precedence predicate transition; lexer grammars never
    /// contain them.
    #[allow(clippy::too_many_arguments)]
    fn get_epsilon_target<S, H>(
        &mut self,
        input: &mut S,
        host: &mut H,
        config: &LexerAtnConfig,
        transition: &Transition,
        configs: &mut AtnConfigSet,
        speculative: bool,
        treat_eof_as_epsilon: bool,
    ) -> Option<LexerAtnConfig>
    where
        S: CharStream + ?Sized,
        H: LexerHost + ?Sized,
    {
        let shared = self.shared.clone();
        match transition {
            Transition::Rule { target, follow, .. } => {
                let context = PredictionContext::singleton(
                    Some(config.context.clone()),
                    *follow as u32,
                );
                Some(config.with_context(*target, context, self.non_greedy_decision(*target)))
            }
            Transition::PrecedencePredicate { .. } => {
                panic!("precedence predicates are not supported in lexers")
            }
            Transition::Predicate {
                target,
                rule_index,
                pred_index,
                ..
            } => {
                // Predicate-dependent sets must never be reachable through
                // cached DFA edges; taint the set either way.
                configs.has_semantic_context = true;
                if self.evaluate_predicate(input, host, *rule_index, *pred_index, speculative) {
                    Some(config.transit(*target, self.non_greedy_decision(*target)))
                } else {
                    None
                }
            }
            Transition::Action { target, action_index, .. } => {
                if config.context.has_empty_path() {
                    // Only the outermost rule invocation queues actions;
                    // inside referenced rules the transition is a plain
                    // epsilon step.
                    let executor = LexerActionExecutor::append(
                        config.lexer_action_executor.as_ref(),
                        shared.atn.lexer_actions[*action_index].clone(),
                    );
                    Some(config.with_executor(
                        *target,
                        Some(executor),
                        self.non_greedy_decision(*target),
                    ))
                } else {
                    Some(config.transit(*target, self.non_greedy_decision(*target)))
                }
            }
            Transition::Epsilon { target, .. } => {
                Some(config.transit(*target, self.non_greedy_decision(*target)))
            }
            Transition::Atom { .. }
            | Transition::Range { .. }
            | Transition::Set { .. }
            | Transition::NotSet { .. }
            | Transition::Wildcard { .. } => {
                if treat_eof_as_epsilon
                    && transition.matches(EOF, MIN_CHAR_VALUE, MAX_CHAR_VALUE)
                {
                    let target = transition.target();
                    Some(config.transit(target, self.non_greedy_decision(target)))
                } else {
                    None
                }
            }
        }
    }

    /// Evaluate a semantic predicate through the host. Speculative
    /// evaluations (mid-match) consume the pending character first so the
    /// host observes the post-match position, then restore everything.
    fn evaluate_predicate<S, H>(
        &mut self,
        input: &mut S,
        host: &mut H,
        rule_index: usize,
        pred_index: usize,
        speculative: bool,
    ) -> bool
    where
        S: CharStream + ?Sized,
        H: LexerHost + ?Sized,
    {
        if !speculative {
            return host.sempred(rule_index, pred_index);
        }
        let saved_column = self.column;
        let saved_line = self.line;
        let index = input.index();
        let marker = input.mark();
        self.consume(input);
        let result = host.sempred(rule_index, pred_index);
        self.column = saved_column;
        self.line = saved_line;
        input.seek(index);
        input.release(marker);
        result
    }

    fn compute_start_state<S, H>(
        &mut self,
        input: &mut S,
        host: &mut H,
        start_state: StateNumber,
        configs: &mut AtnConfigSet,
    ) where
        S: CharStream + ?Sized,
        H: LexerHost + ?Sized,
    {
        let shared = self.shared.clone();
        let context = PredictionContext::empty();
        for (i, transition) in shared.atn.state(start_state).transitions.iter().enumerate() {
            let config =
                LexerAtnConfig::new(transition.target(), (i + 1) as u32, context.clone());
            self.closure(input, host, config, configs, false, false, false);
        }
    }

    fn fail_or_accept<S, H>(
        &mut self,
        input: &mut S,
        host: &mut H,
        s: &Arc<DfaState>,
        t: i32,
    ) -> Result<i32, NoViableAltError>
    where
        S: CharStream + ?Sized,
        H: LexerHost + ?Sized,
    {
        if let Some(accept_state) = self.prev_accept.dfa_state.clone() {
            let (index, line, column) = (
                self.prev_accept.index,
                self.prev_accept.line,
                self.prev_accept.column,
            );
            self.accept(
                input,
                host,
                accept_state.lexer_action_executor.clone(),
                self.start_index,
                index,
                line,
                column,
            );
            return Ok(accept_state.prediction);
        }
        // A mode with no viable alternative at EOF still reports EOF when
        // nothing was consumed.
        if t == EOF && input.index() == self.start_index {
            return Ok(TOKEN_EOF);
        }
        input.seek(self.start_index);
        Err(NoViableAltError::new(self.start_index, s.configs.clone()))
    }

    /// Rewind to the accept point, restore its line/column, and run the
    /// queued actions in order.
    #[allow(clippy::too_many_arguments)]
    fn accept<S, H>(
        &mut self,
        input: &mut S,
        host: &mut H,
        executor: Option<Arc<LexerActionExecutor>>,
        start_index: usize,
        index: usize,
        line: u32,
        column: u32,
    ) where
        S: CharStream + ?Sized,
        H: LexerHost + ?Sized,
    {
        trace!(start = start_index, stop = index, "accept");
        input.seek(index);
        self.line = line;
        self.column = column;
        if let Some(executor) = executor {
            executor.execute(host, input, start_index);
        }
    }

    fn capture_sim_state<S: CharStream + ?Sized>(&mut self, input: &mut S, state: &Arc<DfaState>) {
        self.prev_accept.index = input.index();
        self.prev_accept.line = self.line;
        self.prev_accept.column = self.column;
        self.prev_accept.dfa_state = Some(state.clone());
    }

    /// Intern `configs` as a DFA state for the current mode, canonicalizing
    /// its contexts against the shared cache and freezing it.
    fn add_dfa_state(&mut self, mut configs: AtnConfigSet) -> Arc<DfaState> {
        debug_assert!(!configs.has_semantic_context);
        let shared = self.shared.clone();
        let mut is_accept = false;
        let mut prediction = 0;
        let mut executor = None;
        for config in configs.iter() {
            let state = shared.atn.state(config.state);
            if state.is_rule_stop() {
                is_accept = true;
                executor = config.lexer_action_executor.clone();
                prediction = shared.atn.rule_to_token_type[state.rule_index as usize];
                break;
            }
        }

        let mut visited = VisitedContexts::default();
        configs.map_contexts(|context| {
            get_cached_context(context, &shared.context_cache, &mut visited)
        });
        configs.set_read_only(true);

        let dfa = shared.dfa(self.mode);
        let before = dfa.state_count();
        let state = dfa.add_state(Arc::new(configs), is_accept, prediction, executor);
        if state.state_number >= before {
            self.metrics.dfa_states_created += 1;
            debug!(
                mode = self.mode,
                state = state.state_number,
                accept = is_accept,
                "interned dfa state"
            );
        }
        state
    }

    fn non_greedy_decision(&self, state: StateNumber) -> bool {
        let state = self.shared.atn.state(state);
        state.non_greedy && state.kind.is_decision()
    }
}
