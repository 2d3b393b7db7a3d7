//! The probe surface called by instrumented code.

use lumen_core::id::{ExecutionContextId, OperationId, SubmissionId};
use lumen_core::operation::Arguments;

use crate::error::ProbeError;

/// Where a probe fired: which context, under which submission, for which
/// instrumented construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProbeSite {
    pub context: ExecutionContextId,
    pub submission: SubmissionId,
    pub id: OperationId,
}

impl ProbeSite {
    pub fn new(context: ExecutionContextId, submission: SubmissionId, id: OperationId) -> Self {
        ProbeSite {
            context,
            submission,
            id,
        }
    }
}

/// Receiver for the events an instrumented program reports.
///
/// Values arrive already display-formatted. Every call may refuse with a
/// [`ProbeError`]; callers stop executing the program when one is returned.
pub trait ProbeSink: Send + Sync {
    fn begin_method(&self, site: ProbeSite, name: &str, args: Arguments)
        -> Result<(), ProbeError>;

    fn record_value(&self, site: ProbeSite, name: &str, value: String) -> Result<(), ProbeError>;

    /// Records the new value of a postfix-incremented variable. The caller
    /// still yields the original value to the enclosing expression.
    fn record_postfix(&self, site: ProbeSite, name: &str, value: String) -> Result<(), ProbeError> {
        self.record_value(site, name, value)
    }

    /// Records a method exit, with its value when the method returns one.
    fn record_return(&self, site: ProbeSite, value: Option<String>) -> Result<(), ProbeError>;

    fn begin_loop(&self, site: ProbeSite) -> Result<(), ProbeError>;

    fn end_loop(&self, site: ProbeSite) -> Result<(), ProbeError>;

    fn begin_iteration(&self, site: ProbeSite) -> Result<(), ProbeError>;

    fn end_iteration(&self, site: ProbeSite) -> Result<(), ProbeError>;
}

/// Accepts and discards every probe.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl ProbeSink for NoopSink {
    fn begin_method(&self, _: ProbeSite, _: &str, _: Arguments) -> Result<(), ProbeError> {
        Ok(())
    }

    fn record_value(&self, _: ProbeSite, _: &str, _: String) -> Result<(), ProbeError> {
        Ok(())
    }

    fn record_return(&self, _: ProbeSite, _: Option<String>) -> Result<(), ProbeError> {
        Ok(())
    }

    fn begin_loop(&self, _: ProbeSite) -> Result<(), ProbeError> {
        Ok(())
    }

    fn end_loop(&self, _: ProbeSite) -> Result<(), ProbeError> {
        Ok(())
    }

    fn begin_iteration(&self, _: ProbeSite) -> Result<(), ProbeError> {
        Ok(())
    }

    fn end_iteration(&self, _: ProbeSite) -> Result<(), ProbeError> {
        Ok(())
    }
}
