//! Versioned, cancelable units of work.
//!
//! A [`SubmissionTracker`] hands out [`Submission`]s with strictly increasing
//! ids. Beginning a new one supersedes and cancels the previous one. The only
//! state shared across runs is the "current id" cell, advanced with a single
//! compare-and-set per submission.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use lumen_core::id::{ExecutionContextId, OperationId, SubmissionId};
use lumen_core::operation::MethodCall;

use crate::error::CancelReason;

/// Issues submissions and remembers which one is current.
#[derive(Debug, Default)]
pub struct SubmissionTracker {
    current: Arc<AtomicU64>,
    active: Mutex<Option<Arc<Submission>>>,
}

impl SubmissionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new submission, cancelling whichever one was current.
    pub fn begin(&self, harness: impl Into<String>) -> Arc<Submission> {
        let mut active = self.active.lock();

        let mut observed = self.current.load(Ordering::Acquire);
        let id = loop {
            let next = observed + 1;
            match self.current.compare_exchange(
                observed,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break SubmissionId(next),
                Err(actual) => observed = actual,
            }
        };

        let submission = Arc::new(Submission {
            id,
            harness: harness.into(),
            current: Arc::clone(&self.current),
            canceled: AtomicBool::new(false),
            reason: Mutex::new(None),
            next_operation: AtomicU32::new(0),
            traces: Mutex::new(None),
        });

        if let Some(previous) = active.replace(Arc::clone(&submission)) {
            previous.cancel(CancelReason::Superseded);
            tracing::debug!(
                superseded = %previous.id(),
                submission = %id,
                "previous submission superseded"
            );
        }
        tracing::info!(submission = %id, "submission started");
        submission
    }

    /// Id of the most recently started submission.
    pub fn current(&self) -> SubmissionId {
        SubmissionId(self.current.load(Ordering::Acquire))
    }

    pub fn is_current(&self, id: SubmissionId) -> bool {
        self.current() == id
    }

    /// The most recently started submission, if any.
    pub fn active(&self) -> Option<Arc<Submission>> {
        self.active.lock().clone()
    }
}

/// One logical instrument, compile and execute run.
#[derive(Debug)]
pub struct Submission {
    id: SubmissionId,
    harness: String,
    current: Arc<AtomicU64>,
    canceled: AtomicBool,
    reason: Mutex<Option<CancelReason>>,
    next_operation: AtomicU32,
    traces: Mutex<Option<IndexMap<ExecutionContextId, MethodCall>>>,
}

impl Submission {
    pub fn id(&self) -> SubmissionId {
        self.id
    }

    /// Statement text the evaluator wraps as the entry point.
    pub fn harness(&self) -> &str {
        &self.harness
    }

    /// Whether no newer submission has been started since this one.
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::Acquire) == self.id.0
    }

    /// Requests cancellation. The first reason recorded wins.
    pub fn cancel(&self, reason: CancelReason) {
        let mut slot = self.reason.lock();
        if slot.is_none() {
            *slot = Some(reason);
            self.canceled.store(true, Ordering::Release);
            tracing::debug!(submission = %self.id, %reason, "submission canceled");
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }

    /// Why the submission was canceled, if it was.
    pub fn cancellation(&self) -> Option<CancelReason> {
        if self.is_canceled() {
            *self.reason.lock()
        } else {
            None
        }
    }

    /// Next id from the per-submission counter used by the rewriter.
    pub fn next_operation_id(&self) -> OperationId {
        OperationId(self.next_operation.fetch_add(1, Ordering::Relaxed))
    }

    /// Number of operation ids handed out so far.
    pub fn operation_ids_issued(&self) -> u32 {
        self.next_operation.load(Ordering::Relaxed)
    }

    /// Stores the completed traces after execution.
    pub fn set_traces(&self, traces: IndexMap<ExecutionContextId, MethodCall>) {
        *self.traces.lock() = Some(traces);
    }

    /// Completed traces, once the run has finished.
    pub fn traces(&self) -> Option<IndexMap<ExecutionContextId, MethodCall>> {
        self.traces.lock().clone()
    }
}
