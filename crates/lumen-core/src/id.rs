//! Stable ID newtypes for instrumentation and trace entities.
//!
//! All IDs are distinct newtype wrappers so that an `OperationId` cannot be
//! accidentally used where a `SubmissionId` is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier assigned to one instrumented source construct.
///
/// Assigned once during instrumentation and reused by every execution of the
/// construct within the same submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OperationId(pub u32);

/// Sequence number of one instrument/compile/execute unit of work.
///
/// Strictly increasing; a larger id always supersedes a smaller one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubmissionId(pub u64);

/// Identity of one independent thread of control inside a sandboxed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExecutionContextId(pub u64);

/// Index of a source text within an ordered project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceIndex(pub u32);

// Display implementations -- just print the inner value.

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ExecutionContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for SourceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl OperationId {
    /// Returns the id that follows this one.
    pub fn next(self) -> OperationId {
        OperationId(self.0 + 1)
    }
}
