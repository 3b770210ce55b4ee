//! # Error Types
//!
//! Errors surfaced by the runtime core.
//!
//! ## Overview
//!
//! - [`DeserializeError`]: the serialized ATN payload cannot be loaded,
//!   either because the format is unsupported (wrong version, unknown
//!   feature UUID, unknown codes, truncation) or because the decoded graph
//!   fails structural verification.
//! - [`NoViableAltError`]: no lexer rule matched at the current input
//!   position. Recoverable by the host; carries the dead-end configurations
//!   for diagnostics.
//!
//! Internal invariant violations (mutating a frozen config set, a
//! precedence predicate reaching lexer closure) panic instead; they are
//! implementation bugs, not runtime conditions.
//!
//! When the `diagnostics` feature is enabled, errors derive
//! [`miette::Diagnostic`] for rich reporting.

use crate::config::AtnConfigSet;
use std::sync::Arc;
use thiserror::Error;

#[cfg(feature = "diagnostics")]
use miette::Diagnostic;

/// Failure to load a serialized ATN payload.
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum DeserializeError {
    #[error("serialized ATN version {found} is not supported (expected {expected})")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(atn::bad_version)))]
    BadVersion { found: u16, expected: u16 },

    #[error("serialized ATN feature set {uuid} is not recognized")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(atn::unknown_uuid)))]
    UnknownUuid { uuid: String },

    #[error("serialized ATN data is truncated at element {offset}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(atn::truncated)))]
    Truncated { offset: usize },

    #[error("unknown {what} code {code} at element {offset}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(atn::unknown_code)))]
    UnknownCode {
        what: &'static str,
        code: u32,
        offset: usize,
    },

    #[error("inconsistent ATN: {reason} (state {state})")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(atn::inconsistent)))]
    Inconsistent { reason: String, state: usize },
}

/// No lexer rule matched. The input has been rewound to `start_index`; the
/// simulator's line, column and mode keep the values they had when the last
/// successful character was consumed.
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
#[error("no viable token alternative at input index {start_index}")]
#[cfg_attr(feature = "diagnostics", diagnostic(code(lexer::no_viable_alternative)))]
pub struct NoViableAltError {
    /// Code-point index where the failed match began.
    pub start_index: usize,
    /// The configurations that were live when the simulation died.
    pub dead_end_configs: Arc<AtnConfigSet>,
}

impl NoViableAltError {
    #[must_use]
    pub fn new(start_index: usize, dead_end_configs: Arc<AtnConfigSet>) -> Self {
        Self {
            start_index,
            dead_end_configs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_error_display() {
        let error = DeserializeError::BadVersion { found: 9, expected: 3 };
        assert!(error.to_string().contains("version 9"));

        let error = DeserializeError::UnknownCode {
            what: "transition",
            code: 99,
            offset: 12,
        };
        let text = error.to_string();
        assert!(text.contains("transition"));
        assert!(text.contains("99"));
    }

    #[test]
    fn test_no_viable_alt_display() {
        let error = NoViableAltError::new(7, Arc::new(AtnConfigSet::new()));
        assert!(error.to_string().contains('7'));
        assert_eq!(error.start_index, 7);
        assert!(error.dead_end_configs.is_empty());
    }
}
