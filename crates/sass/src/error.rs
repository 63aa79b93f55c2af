// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for SASS instruction parsing.

use thiserror::Error;

/// An instruction line that does not match the SASS grammar.
///
/// Parsing is all-or-nothing: whenever one of these is returned, no part of
/// the line has been accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Nothing to parse after trimming.
    #[error("empty instruction")]
    Empty,
    /// The `@` guard is not a (possibly inverted) predicate register.
    #[error("invalid predicate '{0}'")]
    InvalidPredicate(String),
    /// The mnemonic token is not `BASE(.MODIFIER)*`.
    #[error("invalid opcode '{0}'")]
    InvalidOpcode(String),
    /// Two separators with nothing between them (e.g. `R0, , R1`).
    #[error("empty operand at position {position}")]
    EmptyOperand {
        /// Zero-based operand position.
        position: usize,
    },
    /// A `[` or `(` without its partner, or a stray closing delimiter.
    #[error("unbalanced delimiter in '{0}'")]
    UnbalancedDelimiter(String),
    /// A token that matches no operand shape.
    #[error("invalid operand '{operand}': {reason}")]
    InvalidOperand {
        /// The offending operand text.
        operand: String,
        /// What was expected.
        reason: &'static str,
    },
}

/// Result type alias for SASS parsing.
pub type Result<T> = std::result::Result<T, ParseError>;
