//! Sandbox error types.
//!
//! [`SandboxError`] covers failures of the sandbox itself: temp storage,
//! artifacts, the executor. [`EvaluationError`] is what an evaluation
//! returns when it produces no trace at all. Runtime failures and
//! cancellations of user code are not errors here; they travel inside an
//! [`Evaluation`](crate::Evaluation) alongside the partial trace.

use std::path::PathBuf;

use lumen_check::Diagnostic;
use lumen_trace::StackViolation;

/// Failures of the sandbox machinery.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// Filesystem I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A reference could not be copied into the isolation domain.
    #[error("failed to copy reference '{}': {source}", .path.display())]
    Reference {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing or reading a compiled artifact failed.
    #[error("artifact error: {0}")]
    Artifact(#[from] serde_json::Error),

    /// The executor could not run the program.
    #[error("executor failure: {0}")]
    Executor(String),
}

/// A diagnostic with its position resolved against the text it refers to.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CompileMessage {
    /// Name of the source text, `<harness>` for the harness.
    pub source: String,
    pub line: u32,
    pub column: u32,
    pub code: &'static str,
    pub message: String,
    pub is_error: bool,
}

/// Why an evaluation produced no trace.
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    /// The project and harness did not compile; nothing was executed.
    #[error("compilation failed with {} error(s)", count_errors(.diagnostics))]
    Compile {
        diagnostics: Vec<Diagnostic>,
        messages: Vec<CompileMessage>,
    },

    /// The recorder and the instrumented code disagree about nesting.
    #[error("trace stack violation: {0}")]
    Violation(StackViolation),

    #[error(transparent)]
    Sandbox(#[from] SandboxError),
}

fn count_errors(diagnostics: &[Diagnostic]) -> usize {
    diagnostics.iter().filter(|d| d.is_error()).count()
}

/// Why a live-session submission produced no evaluation.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The project did not compile; nothing was instrumented.
    #[error(transparent)]
    Rejected(#[from] lumen_instrument::Rejected),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    /// A reference could not be read from its original location.
    #[error("failed to read reference: {0}")]
    Io(#[from] std::io::Error),
}
