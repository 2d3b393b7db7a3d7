//! Core error types for lumen-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering every
//! way source text can fail to become an AST. Parse failures are reported as
//! values; nothing downstream runs on a tree that did not parse.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::span::Span;

/// Errors produced while preprocessing, lexing or parsing source text.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ParseError {
    /// A character that starts no token.
    #[error("unexpected character '{ch}'")]
    UnexpectedCharacter { ch: char, span: Span },

    /// A string or char literal without its closing quote.
    #[error("unterminated literal")]
    UnterminatedLiteral { span: Span },

    /// A `/*` comment without its closing `*/`.
    #[error("unterminated block comment")]
    UnterminatedComment { span: Span },

    /// A numeric literal that does not fit its type.
    #[error("invalid number literal '{text}'")]
    InvalidNumber { text: String, span: Span },

    /// An unknown escape sequence in a string or char literal.
    #[error("invalid escape sequence '\\{ch}'")]
    InvalidEscape { ch: char, span: Span },

    /// A token that does not fit the grammar at this point.
    #[error("expected {expected}, found {found}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },

    /// Input ended while a construct was still open.
    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: String, span: Span },

    /// The left side of an assignment or increment is not assignable.
    #[error("invalid assignment target")]
    InvalidAssignmentTarget { span: Span },

    /// `#else`/`#endif` without `#if`, `#if` without `#endif`, or an unknown directive.
    #[error("invalid preprocessor directive: {reason}")]
    InvalidDirective { reason: String, span: Span },

    /// A reserved `__` probe form with the wrong shape.
    #[error("malformed probe '{name}': {reason}")]
    MalformedProbe {
        name: String,
        reason: String,
        span: Span,
    },
}

impl ParseError {
    /// Source span the error points at.
    pub fn span(&self) -> Span {
        match self {
            ParseError::UnexpectedCharacter { span, .. }
            | ParseError::UnterminatedLiteral { span }
            | ParseError::UnterminatedComment { span }
            | ParseError::InvalidNumber { span, .. }
            | ParseError::InvalidEscape { span, .. }
            | ParseError::UnexpectedToken { span, .. }
            | ParseError::UnexpectedEof { span, .. }
            | ParseError::InvalidAssignmentTarget { span }
            | ParseError::InvalidDirective { span, .. }
            | ParseError::MalformedProbe { span, .. } => *span,
        }
    }
}
