//! Probe outcomes that are not plain success.
//!
//! Cancellation and contract violation are kept apart: a superseded or
//! runaway run unwinds quietly through [`ProbeError::Canceled`], while a
//! [`StackViolation`] means instrumentation and recording disagree and must
//! surface as an internal failure.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use lumen_core::id::{ExecutionContextId, OperationId};

/// Why a run stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
pub enum CancelReason {
    /// A newer submission became current.
    #[error("superseded by a newer submission")]
    Superseded,
    /// The owner asked the submission to stop.
    #[error("cancellation requested")]
    Requested,
    /// The infinite-loop detector tripped on this loop.
    #[error("loop {loop_id} is likely infinite")]
    LikelyInfinite { loop_id: OperationId },
}

/// The probe entry points, for violation reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProbeKind {
    BeginMethod,
    RecordValue,
    RecordPostfix,
    RecordReturn,
    BeginLoop,
    EndLoop,
    BeginIteration,
    EndIteration,
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProbeKind::BeginMethod => "beginMethod",
            ProbeKind::RecordValue => "recordValue",
            ProbeKind::RecordPostfix => "recordPostfix",
            ProbeKind::RecordReturn => "recordReturn",
            ProbeKind::BeginLoop => "beginLoop",
            ProbeKind::EndLoop => "endLoop",
            ProbeKind::BeginIteration => "beginIteration",
            ProbeKind::EndIteration => "endIteration",
        };
        f.write_str(name)
    }
}

/// Kinds of open container on a context's stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerKind {
    Method,
    Loop,
    Iteration,
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContainerKind::Method => "method call",
            ContainerKind::Loop => "loop",
            ContainerKind::Iteration => "loop iteration",
        };
        f.write_str(name)
    }
}

/// A probe arrived that the open-container stack cannot accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum StackViolation {
    #[error("{probe} on an empty stack in context {context}")]
    EmptyStack {
        probe: ProbeKind,
        context: ExecutionContextId,
    },

    #[error("{probe} expected an open {expected} but found {found} in context {context}")]
    Mismatch {
        probe: ProbeKind,
        expected: ContainerKind,
        found: ContainerKind,
        context: ExecutionContextId,
    },
}

/// Result of a probe that did not simply succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ProbeError {
    #[error("canceled: {0}")]
    Canceled(CancelReason),

    #[error("trace stack discipline violated: {0}")]
    Violation(StackViolation),
}

impl ProbeError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ProbeError::Canceled(_))
    }
}

impl From<StackViolation> for ProbeError {
    fn from(violation: StackViolation) -> Self {
        ProbeError::Violation(violation)
    }
}

impl From<CancelReason> for ProbeError {
    fn from(reason: CancelReason) -> Self {
        ProbeError::Canceled(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_probe_and_context() {
        let violation = StackViolation::Mismatch {
            probe: ProbeKind::EndLoop,
            expected: ContainerKind::Loop,
            found: ContainerKind::Iteration,
            context: ExecutionContextId(2),
        };
        assert_eq!(
            violation.to_string(),
            "endLoop expected an open loop but found loop iteration in context 2"
        );
    }

    #[test]
    fn likely_infinite_is_distinguishable() {
        let err = ProbeError::from(CancelReason::LikelyInfinite {
            loop_id: OperationId(4),
        });
        assert!(err.is_cancellation());
        assert_eq!(err.to_string(), "canceled: loop 4 is likely infinite");
        assert_ne!(
            CancelReason::LikelyInfinite {
                loop_id: OperationId(4)
            },
            CancelReason::Requested
        );
    }
}
