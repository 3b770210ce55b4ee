//! # atnlex
//!
//! An adaptive lexer runtime: the matching core of a parser-generator
//! toolchain, turning streams of Unicode code points into tokens by
//! simulating a serialized Augmented Transition Network (ATN) with
//! on-the-fly NFA-to-DFA construction.
//!
//! ## Overview
//!
//! A parser generator compiles lexer grammars ahead of time into a compact
//! binary transition network. Generated lexer classes stay tiny: they ship
//! that payload plus, at most, a semantic-predicate evaluator and a custom
//! action table. Everything else lives here:
//!
//! - **Deserialization**: the version-3 payload format, feature-gated by
//!   UUID, with structural verification ([`atn::AtnDeserializer`]).
//! - **Prediction contexts**: the shared, interned graph-structured stack
//!   of rule-call frames used during closure ([`context`]).
//! - **The simulator**: DFA walk with ATN fallback, longest-match /
//!   first-rule-wins arbitration, predicate handling that never pollutes
//!   the DFA cache, and position-dependent action deferral
//!   ([`simulator::LexerAtnSimulator`]).
//! - **Token emission**: the driver loop, skip/more handling and the mode
//!   stack ([`lexer::Lexer`]).
//!
//! The ATN, the per-mode DFAs and the context cache are built once per
//! grammar ([`dfa::CompiledAtn`]) and shared by every lexer instance, safe
//! under concurrent readers.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use atnlex::atn::AtnDeserializer;
//! use atnlex::dfa::CompiledAtn;
//! use atnlex::lexer::Lexer;
//! use atnlex::stream::CodePointStream;
//! use std::sync::Arc;
//!
//! // The serialized ATN ships inside the generated lexer.
//! # let payload: Vec<u16> = vec![];
//! let atn = AtnDeserializer::default().deserialize(&payload)?;
//! let compiled = Arc::new(CompiledAtn::new(Arc::new(atn)));
//!
//! // One lexer per input; the compiled data is shared between instances.
//! let mut lexer = Lexer::simple(compiled, CodePointStream::new("a  b"));
//! for token in lexer.tokenize().expect("tokens") {
//!     println!("{} {:?} @{}:{}", token.kind, token.text, token.line, token.column);
//! }
//! # Ok::<(), atnlex::error::DeserializeError>(())
//! ```
//!
//! ## Modules
//!
//! - [`atn`] - The deserialized transition network
//! - [`context`] - Prediction contexts (graph-structured stack)
//! - [`config`] - ATN configurations and config sets
//! - [`dfa`] - The lazily materialized DFA and shared grammar data
//! - [`simulator`] - The adaptive matching loop
//! - [`lexer`] - Host surface, tokens and the emission driver
//! - [`stream`] - Code-point input streams
//! - [`interval`] - Interval sets used as transition labels
//! - [`action`] - Lexer actions and their executor
//! - [`error`] - Error types
//! - [`testing`] - Payload builders for tests

pub mod action;
pub mod atn;
pub mod config;
pub mod context;
pub mod dfa;
pub mod error;
pub mod interval;
pub mod lexer;
pub mod simulator;
pub mod stream;
pub mod testing;

// Re-export the types most integrations touch.
pub use atn::{Atn, AtnDeserializer, DeserializeOptions};
pub use dfa::CompiledAtn;
pub use error::{DeserializeError, NoViableAltError};
pub use interval::IntervalSet;
pub use lexer::{Lexer, LexerCallbacks, Token};
pub use simulator::LexerAtnSimulator;
pub use stream::{CharStream, CodePointStream};
