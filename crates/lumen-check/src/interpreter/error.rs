//! Runtime errors raised by user code, and the ways a run can stop.
//!
//! [`RuntimeError`] carries the method and source span where execution
//! failed, so callers can report a line and column without parsing any
//! stack text.

use serde::{Deserialize, Serialize};

use lumen_core::id::SourceIndex;
use lumen_core::span::Span;
use lumen_trace::{CancelReason, ProbeError, StackViolation};

/// The condition that stopped user code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum RuntimeErrorKind {
    #[error("arithmetic operation resulted in an overflow")]
    IntegerOverflow,

    #[error("attempted to divide by zero")]
    DivideByZero,

    #[error("index {index} was outside the bounds of the array (length {length})")]
    IndexOutOfRange { index: i64, length: usize },

    #[error("arithmetic operation resulted in a negative array size ({size})")]
    NegativeArraySize { size: i64 },

    #[error("array length {size} exceeds the limit of {limit}")]
    ArrayTooLarge { size: i64, limit: usize },

    #[error("call depth limit ({limit}) exceeded")]
    CallDepthExceeded { limit: usize },

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("variable '{name}' is not defined")]
    UndefinedVariable { name: String },

    #[error("method '{name}' not found")]
    MethodNotFound { name: String },

    #[error("object reference not set to an instance of an object")]
    NullReference,

    #[error("internal error: {message}")]
    Internal { message: String },
}

/// A runtime failure with the place it happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind} (in method '{method}')")]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub method: String,
    pub source_index: SourceIndex,
    pub span: Span,
}

/// Why execution stopped before completing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum ExecError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("execution canceled: {0}")]
    Canceled(CancelReason),

    /// The recorder and the instrumented code disagree about nesting.
    #[error("trace stack violation: {0}")]
    Violation(StackViolation),
}

impl ExecError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ExecError::Canceled(_))
    }
}

impl From<ProbeError> for ExecError {
    fn from(error: ProbeError) -> Self {
        match error {
            ProbeError::Canceled(reason) => ExecError::Canceled(reason),
            ProbeError::Violation(violation) => ExecError::Violation(violation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::id::OperationId;

    #[test]
    fn probe_errors_map_onto_exec_errors() {
        let canceled: ExecError = ProbeError::Canceled(CancelReason::LikelyInfinite {
            loop_id: OperationId(4),
        })
        .into();
        assert!(canceled.is_cancellation());

        let runtime = ExecError::from(RuntimeError {
            kind: RuntimeErrorKind::DivideByZero,
            method: "F".into(),
            source_index: SourceIndex(0),
            span: Span::new(3, 8),
        });
        assert!(!runtime.is_cancellation());
        assert_eq!(
            runtime.to_string(),
            "attempted to divide by zero (in method 'F')"
        );
    }
}
