//! Submissions, the trace recorder and infinite-loop detection.
//!
//! Instrumented programs report events through the [`ProbeSink`] trait. The
//! [`Recorder`] implementation builds one operation tree per execution
//! context, refuses probes from superseded submissions, and cancels loops the
//! [`LoopDetector`] judges likely infinite.

pub mod detector;
pub mod error;
pub mod recorder;
pub mod sink;
pub mod submission;

pub use detector::{DetectorConfig, LoopDetector};
pub use error::{CancelReason, ContainerKind, ProbeError, ProbeKind, StackViolation};
pub use recorder::Recorder;
pub use sink::{NoopSink, ProbeSink, ProbeSite};
pub use submission::{Submission, SubmissionTracker};
