//! # Lexer Host Surface
//!
//! What a generated lexer looks like to the simulator, and the driver that
//! turns simulator verdicts into tokens.
//!
//! ## Overview
//!
//! The simulator never knows the concrete lexer type. It sees a
//! [`LexerHost`]: a small capability surface for the things lexer actions
//! and predicates touch (token type, channel, mode stack, custom action and
//! predicate hooks). A generated lexer supplies only a [`LexerCallbacks`]
//! implementation, its `sempred` and `action` tables; everything else
//! lives in [`LexerCore`] and the [`Lexer`] driver.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use atnlex::atn::AtnDeserializer;
//! use atnlex::dfa::CompiledAtn;
//! use atnlex::lexer::Lexer;
//! use atnlex::stream::CodePointStream;
//! use std::sync::Arc;
//!
//! # let payload: Vec<u16> = vec![];
//! let atn = AtnDeserializer::default().deserialize(&payload)?;
//! let compiled = Arc::new(CompiledAtn::new(Arc::new(atn)));
//! let mut lexer = Lexer::simple(compiled, CodePointStream::new("if x == 42"));
//! let tokens = lexer.tokenize().expect("token stream");
//! # Ok::<(), atnlex::error::DeserializeError>(())
//! ```

use crate::dfa::CompiledAtn;
use crate::error::NoViableAltError;
use crate::simulator::LexerAtnSimulator;
use crate::stream::{CharStream, EOF};
use compact_str::CompactString;
use smallvec::SmallVec;
use std::ops::Range;
use std::sync::Arc;

/// Token type of the synthetic end-of-input token.
pub const TOKEN_EOF: i32 = -1;
/// Token type before any rule has decided.
pub const TOKEN_INVALID: i32 = 0;
/// Smallest token type a grammar rule can emit.
pub const MIN_USER_TOKEN_TYPE: i32 = 1;
/// Sentinel set by a `skip` action: drop the matched text.
pub const TOKEN_SKIP: i32 = -3;
/// Sentinel set by a `more` action: keep matching into the same token.
pub const TOKEN_MORE: i32 = -2;

pub const DEFAULT_CHANNEL: u32 = 0;
pub const HIDDEN_CHANNEL: u32 = 1;
pub const DEFAULT_MODE: usize = 0;

/// One emitted token.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Token {
    pub kind: i32,
    pub channel: u32,
    pub text: CompactString,
    /// Half-open code-point range in the input.
    pub span: Range<usize>,
    /// 1-based line of the first code point.
    pub line: u32,
    /// 0-based column of the first code point.
    pub column: u32,
}

/// The mutable lexer state that actions operate on.
#[derive(Debug, Clone)]
pub struct LexerCore {
    pub token_type: i32,
    pub channel: u32,
    pub mode: usize,
    pub mode_stack: SmallVec<[usize; 4]>,
}

impl LexerCore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            token_type: TOKEN_INVALID,
            channel: DEFAULT_CHANNEL,
            mode: DEFAULT_MODE,
            mode_stack: SmallVec::new(),
        }
    }

    pub fn push_mode(&mut self, mode: usize) {
        self.mode_stack.push(self.mode);
        self.mode = mode;
    }

    /// # Panics
    ///
    /// Panics when the mode stack is empty.
    pub fn pop_mode(&mut self) {
        let previous = self
            .mode_stack
            .pop()
            .expect("popMode with an empty mode stack");
        self.mode = previous;
    }
}

impl Default for LexerCore {
    fn default() -> Self {
        Self::new()
    }
}

/// The capability surface the simulator drives while executing actions and
/// evaluating predicates.
pub trait LexerHost {
    fn sempred(&mut self, rule_index: usize, pred_index: usize) -> bool;
    fn custom_action(&mut self, rule_index: usize, action_index: usize);
    fn set_type(&mut self, token_type: i32);
    fn set_channel(&mut self, channel: u32);
    fn set_mode(&mut self, mode: usize);
    fn push_mode(&mut self, mode: usize);
    fn pop_mode(&mut self);
    fn skip(&mut self);
    fn more(&mut self);
}

/// What a generated lexer supplies: its predicate evaluator and custom
/// action table. Defaults are permissive no-ops so grammars without embedded
/// code need nothing.
pub trait LexerCallbacks {
    fn sempred(&mut self, core: &LexerCore, rule_index: usize, pred_index: usize) -> bool {
        let _ = (core, rule_index, pred_index);
        true
    }

    fn action(&mut self, core: &mut LexerCore, rule_index: usize, action_index: usize) {
        let _ = (core, rule_index, action_index);
    }
}

impl LexerCallbacks for () {}

/// Bundles the core state with the generated callbacks into the host view
/// the simulator works against.
struct HostBridge<'a, C: LexerCallbacks> {
    core: &'a mut LexerCore,
    callbacks: &'a mut C,
}

impl<C: LexerCallbacks> LexerHost for HostBridge<'_, C> {
    fn sempred(&mut self, rule_index: usize, pred_index: usize) -> bool {
        self.callbacks.sempred(self.core, rule_index, pred_index)
    }

    fn custom_action(&mut self, rule_index: usize, action_index: usize) {
        self.callbacks.action(self.core, rule_index, action_index);
    }

    fn set_type(&mut self, token_type: i32) {
        self.core.token_type = token_type;
    }

    fn set_channel(&mut self, channel: u32) {
        self.core.channel = channel;
    }

    fn set_mode(&mut self, mode: usize) {
        self.core.mode = mode;
    }

    fn push_mode(&mut self, mode: usize) {
        self.core.push_mode(mode);
    }

    fn pop_mode(&mut self) {
        self.core.pop_mode();
    }

    fn skip(&mut self) {
        self.core.token_type = TOKEN_SKIP;
    }

    fn more(&mut self) {
        self.core.token_type = TOKEN_MORE;
    }
}

/// The token-emission driver: owns an input stream, the mutable lexer state
/// and a simulator, and turns `match` verdicts into [`Token`]s.
pub struct Lexer<C: LexerCallbacks, S: CharStream> {
    simulator: LexerAtnSimulator,
    input: S,
    callbacks: C,
    core: LexerCore,
    token_start_index: usize,
    token_start_line: u32,
    token_start_column: u32,
    hit_eof: bool,
}

impl<S: CharStream> Lexer<(), S> {
    /// A lexer for a grammar without embedded predicates or custom actions.
    #[must_use]
    pub fn simple(compiled: Arc<CompiledAtn>, input: S) -> Self {
        Self::new(compiled, input, ())
    }
}

impl<C: LexerCallbacks, S: CharStream> Lexer<C, S> {
    #[must_use]
    pub fn new(compiled: Arc<CompiledAtn>, input: S, callbacks: C) -> Self {
        Self {
            simulator: LexerAtnSimulator::new(compiled),
            input,
            callbacks,
            core: LexerCore::new(),
            token_start_index: 0,
            token_start_line: 1,
            token_start_column: 0,
            hit_eof: false,
        }
    }

    #[must_use]
    pub const fn core(&self) -> &LexerCore {
        &self.core
    }

    #[must_use]
    pub const fn simulator(&self) -> &LexerAtnSimulator {
        &self.simulator
    }

    pub fn input_mut(&mut self) -> &mut S {
        &mut self.input
    }

    #[must_use]
    pub const fn callbacks(&self) -> &C {
        &self.callbacks
    }

    /// Match and emit the next token.
    ///
    /// # Errors
    ///
    /// Returns [`NoViableAltError`] when no rule matches; the input is
    /// positioned back at the failed token's start. Call
    /// [`Lexer::recover`] to drop one code point and resume.
    pub fn next_token(&mut self) -> Result<Token, NoViableAltError> {
        loop {
            if self.hit_eof {
                return Ok(self.emit_eof());
            }
            self.core.channel = DEFAULT_CHANNEL;
            self.token_start_index = self.input.index();
            self.token_start_line = self.simulator.line();
            self.token_start_column = self.simulator.column();
            loop {
                self.core.token_type = TOKEN_INVALID;
                let mode = self.core.mode;
                let matched = {
                    let mut host = HostBridge {
                        core: &mut self.core,
                        callbacks: &mut self.callbacks,
                    };
                    self.simulator.match_token(&mut self.input, &mut host, mode)?
                };
                if self.input.la(1) == EOF {
                    self.hit_eof = true;
                }
                if self.core.token_type == TOKEN_INVALID {
                    self.core.token_type = matched;
                }
                if self.core.token_type != TOKEN_MORE {
                    break;
                }
            }
            if self.core.token_type == TOKEN_SKIP {
                continue;
            }
            return Ok(self.emit());
        }
    }

    /// Drop one code point after a failed match so lexing can resume.
    pub fn recover(&mut self) {
        if self.input.la(1) != EOF {
            self.simulator.consume(&mut self.input);
        }
    }

    /// Drain the stream, collecting every token up to and including EOF.
    /// Unmatchable code points are dropped one at a time and reported.
    ///
    /// # Errors
    ///
    /// Returns every [`NoViableAltError`] encountered, in input order.
    pub fn tokenize(&mut self) -> Result<Vec<Token>, Vec<NoViableAltError>> {
        let mut tokens = Vec::new();
        let mut errors = Vec::new();
        loop {
            match self.next_token() {
                Ok(token) => {
                    let done = token.kind == TOKEN_EOF;
                    tokens.push(token);
                    if done {
                        break;
                    }
                }
                Err(error) => {
                    errors.push(error);
                    self.recover();
                }
            }
        }
        if errors.is_empty() {
            Ok(tokens)
        } else {
            Err(errors)
        }
    }

    fn emit(&mut self) -> Token {
        let stop = self.input.index();
        Token {
            kind: self.core.token_type,
            channel: self.core.channel,
            text: self.input.text(self.token_start_index..stop),
            span: self.token_start_index..stop,
            line: self.token_start_line,
            column: self.token_start_column,
        }
    }

    fn emit_eof(&mut self) -> Token {
        let index = self.input.index();
        Token {
            kind: TOKEN_EOF,
            channel: DEFAULT_CHANNEL,
            text: CompactString::default(),
            span: index..index,
            line: self.simulator.line(),
            column: self.simulator.column(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_stack() {
        let mut core = LexerCore::new();
        assert_eq!(core.mode, DEFAULT_MODE);
        core.push_mode(2);
        assert_eq!(core.mode, 2);
        core.push_mode(5);
        core.pop_mode();
        assert_eq!(core.mode, 2);
        core.pop_mode();
        assert_eq!(core.mode, DEFAULT_MODE);
    }

    #[test]
    #[should_panic(expected = "empty mode stack")]
    fn test_pop_empty_mode_stack() {
        LexerCore::new().pop_mode();
    }

    #[test]
    fn test_host_bridge_sentinels() {
        let mut core = LexerCore::new();
        let mut callbacks = ();
        let mut host = HostBridge {
            core: &mut core,
            callbacks: &mut callbacks,
        };
        host.skip();
        assert_eq!(host.core.token_type, TOKEN_SKIP);
        host.more();
        assert_eq!(host.core.token_type, TOKEN_MORE);
        host.set_type(7);
        host.set_channel(HIDDEN_CHANNEL);
        assert_eq!(core.token_type, 7);
        assert_eq!(core.channel, HIDDEN_CHANNEL);
    }
}
