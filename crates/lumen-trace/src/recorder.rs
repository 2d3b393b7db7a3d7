//! Runtime counterpart of the injected probes.
//!
//! The [`Recorder`] turns probe calls into [`Operation`] trees. State is kept
//! per execution context in a `DashMap`, so concurrent contexts never share a
//! stack and never contend on one lock. A recorder belongs to exactly one
//! [`Submission`]; probes carrying any other submission id are refused as
//! cancellation and change nothing.
//!
//! Values recorded while the innermost open container is a loop (header
//! initializers, conditions, iterators) are held back and become the first
//! children of the next iteration. Whatever is still held when the loop
//! closes is placed after the loop in its parent.

use std::sync::Arc;

use dashmap::DashMap;
use indexmap::IndexMap;

use lumen_core::id::{ExecutionContextId, OperationId};
use lumen_core::operation::{
    Arguments, HistoryEntry, Loop, LoopIteration, MethodCall, Operation, ReturnValue, StateChange,
};

use crate::detector::{DetectorConfig, LoopDetector};
use crate::error::{CancelReason, ContainerKind, ProbeError, ProbeKind, StackViolation};
use crate::sink::{ProbeSink, ProbeSite};
use crate::submission::Submission;

// ---------------------------------------------------------------------------
// Per-context state
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct OpenLoop {
    node: Loop,
    /// Per-variable values, one slot per iteration.
    histories: IndexMap<String, Vec<HistoryEntry>>,
    /// Operations recorded outside any iteration.
    pending: Vec<Operation>,
}

#[derive(Debug)]
enum Container {
    Method(MethodCall),
    Loop(OpenLoop),
    Iteration(LoopIteration),
}

impl Container {
    fn kind(&self) -> ContainerKind {
        match self {
            Container::Method(_) => ContainerKind::Method,
            Container::Loop(_) => ContainerKind::Loop,
            Container::Iteration(_) => ContainerKind::Iteration,
        }
    }
}

#[derive(Debug, Default)]
struct ContextState {
    /// Open containers, innermost last.
    stack: Vec<Container>,
    /// Top-level method calls that have returned.
    roots: Vec<MethodCall>,
}

impl ContextState {
    /// Fails unless the innermost container is `expected`.
    fn expect_top(
        &self,
        expected: ContainerKind,
        probe: ProbeKind,
        context: ExecutionContextId,
    ) -> Result<(), StackViolation> {
        match self.stack.last() {
            None => Err(StackViolation::EmptyStack { probe, context }),
            Some(top) if top.kind() != expected => Err(StackViolation::Mismatch {
                probe,
                expected,
                found: top.kind(),
                context,
            }),
            Some(_) => Ok(()),
        }
    }

    /// Appends a finished operation to the innermost container.
    fn append(&mut self, op: Operation) {
        match self.stack.last_mut() {
            Some(Container::Method(call)) => call.operations.push(op),
            Some(Container::Iteration(iteration)) => iteration.operations.push(op),
            Some(Container::Loop(open)) => open.pending.push(op),
            None => match op {
                Operation::MethodCall(call) => self.roots.push(call),
                other => tracing::trace!(id = %other.id(), "operation recorded outside any method"),
            },
        }
    }

    /// The loop whose histories a value written now belongs to: the
    /// innermost open loop of the current method.
    fn history_loop(&mut self) -> Option<&mut OpenLoop> {
        for container in self.stack.iter_mut().rev() {
            match container {
                Container::Iteration(_) => continue,
                Container::Loop(open) => return Some(open),
                Container::Method(_) => return None,
            }
        }
        None
    }

    fn record_state(&mut self, change: StateChange) {
        if let Some(open) = self.history_loop() {
            let slot = open.node.iterations.len();
            let history = open.histories.entry(change.variable.clone()).or_default();
            if history.len() > slot {
                history[slot] = HistoryEntry::Value(change.value.clone());
            } else {
                history.resize(slot, HistoryEntry::Skipped);
                history.push(HistoryEntry::Value(change.value.clone()));
            }
        }
        self.append(Operation::StateChange(change));
    }

    /// Pops the innermost iteration into its loop and pads histories.
    /// Returns the loop id.
    fn close_iteration(
        &mut self,
        probe: ProbeKind,
        context: ExecutionContextId,
    ) -> Result<OperationId, StackViolation> {
        self.expect_top(ContainerKind::Iteration, probe, context)?;
        let below = self.stack.len().checked_sub(2).map(|i| self.stack[i].kind());
        match below {
            Some(ContainerKind::Loop) => {}
            Some(found) => {
                return Err(StackViolation::Mismatch {
                    probe,
                    expected: ContainerKind::Loop,
                    found,
                    context,
                })
            }
            None => return Err(StackViolation::EmptyStack { probe, context }),
        }

        let Some(Container::Iteration(iteration)) = self.stack.pop() else {
            return Err(StackViolation::EmptyStack { probe, context });
        };
        let Some(Container::Loop(open)) = self.stack.last_mut() else {
            return Err(StackViolation::EmptyStack { probe, context });
        };
        open.node.iterations.push(iteration);
        let count = open.node.iterations.len();
        for history in open.histories.values_mut() {
            history.resize(count, HistoryEntry::Skipped);
        }
        Ok(open.node.id)
    }

    /// Pops the innermost loop, appends it to its parent, then flushes the
    /// loop's held-back operations after it.
    fn close_loop(
        &mut self,
        probe: ProbeKind,
        context: ExecutionContextId,
    ) -> Result<(), StackViolation> {
        self.expect_top(ContainerKind::Loop, probe, context)?;
        let Some(Container::Loop(open)) = self.stack.pop() else {
            return Err(StackViolation::EmptyStack { probe, context });
        };
        self.append(Operation::Loop(open.node));
        for op in open.pending {
            self.append(op);
        }
        Ok(())
    }

    /// Closes every loop and iteration opened by the current method.
    fn close_method_loops(
        &mut self,
        probe: ProbeKind,
        context: ExecutionContextId,
    ) -> Result<(), StackViolation> {
        loop {
            match self.stack.last().map(Container::kind) {
                Some(ContainerKind::Iteration) => {
                    self.close_iteration(probe, context)?;
                }
                Some(ContainerKind::Loop) => self.close_loop(probe, context)?,
                Some(ContainerKind::Method) | None => return Ok(()),
            }
        }
    }

    /// Force-closes everything still open, outermost survivor last.
    /// Returns the survivor when it is a method call.
    fn unwind(&mut self, context: ExecutionContextId) -> Option<MethodCall> {
        while self.stack.len() > 1 {
            let result = match self.stack.last().map(Container::kind) {
                Some(ContainerKind::Iteration) => self
                    .close_iteration(ProbeKind::RecordReturn, context)
                    .map(|_| ()),
                Some(ContainerKind::Loop) => self.close_loop(ProbeKind::RecordReturn, context),
                _ => match self.stack.pop() {
                    Some(Container::Method(call)) => {
                        self.append(Operation::MethodCall(call));
                        Ok(())
                    }
                    _ => Ok(()),
                },
            };
            if let Err(violation) = result {
                // Only an iteration directly on a method can fail here; fold it in.
                tracing::debug!(%violation, "discarding container during unwind");
                self.stack.pop();
            }
        }
        match self.stack.pop() {
            Some(Container::Method(call)) => Some(call),
            Some(Container::Loop(open)) => {
                tracing::debug!(id = %open.node.id, "dropping loop recorded outside any method");
                None
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Recorder
// ---------------------------------------------------------------------------

/// Builds per-context operation trees for one submission.
pub struct Recorder {
    submission: Arc<Submission>,
    detector: LoopDetector,
    contexts: DashMap<ExecutionContextId, ContextState>,
}

impl Recorder {
    pub fn new(submission: Arc<Submission>, config: DetectorConfig) -> Self {
        Recorder {
            submission,
            detector: LoopDetector::new(config),
            contexts: DashMap::new(),
        }
    }

    pub fn submission(&self) -> &Arc<Submission> {
        &self.submission
    }

    /// Refuses probes from any submission other than the current one.
    fn check_current(&self, site: &ProbeSite) -> Result<(), ProbeError> {
        if site.submission == self.submission.id() && self.submission.is_current() {
            Ok(())
        } else {
            tracing::trace!(
                probe_submission = %site.submission,
                submission = %self.submission.id(),
                "stale probe refused"
            );
            Err(ProbeError::Canceled(CancelReason::Superseded))
        }
    }

    fn violation(&self, violation: StackViolation) -> ProbeError {
        tracing::error!(submission = %self.submission.id(), %violation, "trace stack violation");
        ProbeError::Violation(violation)
    }

    /// Runs `f` against the state of `site.context` after the staleness check.
    fn with_context<T>(
        &self,
        site: &ProbeSite,
        f: impl FnOnce(&mut ContextState) -> Result<T, StackViolation>,
    ) -> Result<T, ProbeError> {
        self.check_current(site)?;
        let mut state = self.contexts.entry(site.context).or_default();
        f(&mut state).map_err(|violation| self.violation(violation))
    }

    /// Closes the innermost loop early and reports `reason`.
    fn abort_loop(
        &self,
        site: &ProbeSite,
        probe: ProbeKind,
        reason: CancelReason,
    ) -> Result<(), ProbeError> {
        self.with_context(site, |state| {
            if state.stack.last().map(Container::kind) == Some(ContainerKind::Iteration) {
                state.close_iteration(probe, site.context)?;
            }
            state.close_loop(probe, site.context)
        })?;
        Err(ProbeError::Canceled(reason))
    }

    /// Returns the root method call of every context that recorded one.
    ///
    /// A context whose top-level call returned reports its first completed
    /// call. A context cut short is force-unwound and its outermost surviving
    /// method call becomes the root. Contexts are ordered by id.
    pub fn collect_completed_traces(&self) -> IndexMap<ExecutionContextId, MethodCall> {
        let mut contexts: Vec<ExecutionContextId> =
            self.contexts.iter().map(|entry| *entry.key()).collect();
        contexts.sort();

        let mut traces = IndexMap::new();
        for context in contexts {
            let Some(mut state) = self.contexts.get_mut(&context) else {
                continue;
            };
            if let Some(survivor) = state.unwind(context) {
                state.roots.push(survivor);
            }
            if let Some(root) = state.roots.first() {
                traces.insert(context, root.clone());
            }
        }
        tracing::debug!(
            submission = %self.submission.id(),
            contexts = traces.len(),
            "collected traces"
        );
        traces
    }
}

impl ProbeSink for Recorder {
    fn begin_method(
        &self,
        site: ProbeSite,
        name: &str,
        args: Arguments,
    ) -> Result<(), ProbeError> {
        self.with_context(&site, |state| {
            state
                .stack
                .push(Container::Method(MethodCall::new(site.id, name, args)));
            Ok(())
        })
    }

    fn record_value(&self, site: ProbeSite, name: &str, value: String) -> Result<(), ProbeError> {
        self.with_context(&site, |state| {
            state.record_state(StateChange {
                id: site.id,
                variable: name.to_string(),
                value,
            });
            Ok(())
        })
    }

    fn record_return(&self, site: ProbeSite, value: Option<String>) -> Result<(), ProbeError> {
        self.with_context(&site, |state| {
            if value.is_some() {
                state.append(Operation::ReturnValue(ReturnValue { id: site.id, value }));
            }
            state.close_method_loops(ProbeKind::RecordReturn, site.context)?;
            state.expect_top(ContainerKind::Method, ProbeKind::RecordReturn, site.context)?;
            if let Some(Container::Method(call)) = state.stack.pop() {
                state.append(Operation::MethodCall(call));
            }
            Ok(())
        })
    }

    fn begin_loop(&self, site: ProbeSite) -> Result<(), ProbeError> {
        self.with_context(&site, |state| {
            state.stack.push(Container::Loop(OpenLoop {
                node: Loop::new(site.id),
                histories: IndexMap::new(),
                pending: Vec::new(),
            }));
            Ok(())
        })
    }

    fn end_loop(&self, site: ProbeSite) -> Result<(), ProbeError> {
        self.with_context(&site, |state| state.close_loop(ProbeKind::EndLoop, site.context))
    }

    fn begin_iteration(&self, site: ProbeSite) -> Result<(), ProbeError> {
        self.with_context(&site, |state| {
            state.expect_top(ContainerKind::Loop, ProbeKind::BeginIteration, site.context)?;
            let mut iteration = LoopIteration::new(site.id);
            if let Some(Container::Loop(open)) = state.stack.last_mut() {
                iteration.operations = std::mem::take(&mut open.pending);
            }
            state.stack.push(Container::Iteration(iteration));
            Ok(())
        })?;

        match self.submission.cancellation() {
            Some(reason) => self.abort_loop(&site, ProbeKind::BeginIteration, reason),
            None => Ok(()),
        }
    }

    fn end_iteration(&self, site: ProbeSite) -> Result<(), ProbeError> {
        let likely_infinite = self.with_context(&site, |state| {
            let loop_id = state.close_iteration(ProbeKind::EndIteration, site.context)?;
            let verdict = match state.stack.last() {
                Some(Container::Loop(open)) => {
                    self.detector.is_likely_infinite(&open.node, &open.histories)
                }
                _ => false,
            };
            Ok(verdict.then_some(loop_id))
        })?;

        if let Some(loop_id) = likely_infinite {
            let reason = CancelReason::LikelyInfinite { loop_id };
            tracing::warn!(
                submission = %self.submission.id(),
                context = %site.context,
                %loop_id,
                "likely infinite loop, canceling"
            );
            self.submission.cancel(reason);
            self.with_context(&site, |state| state.close_loop(ProbeKind::EndIteration, site.context))?;
            return Err(ProbeError::Canceled(reason));
        }

        match self.submission.cancellation() {
            Some(reason) => {
                self.with_context(&site, |state| {
                    state.close_loop(ProbeKind::EndIteration, site.context)
                })?;
                Err(ProbeError::Canceled(reason))
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submission::SubmissionTracker;
    use lumen_core::id::SubmissionId;
    use smallvec::smallvec;

    struct Harness {
        tracker: SubmissionTracker,
        recorder: Recorder,
        sub: SubmissionId,
    }

    impl Harness {
        fn new() -> Self {
            let tracker = SubmissionTracker::new();
            let submission = tracker.begin("");
            let sub = submission.id();
            Harness {
                recorder: Recorder::new(submission, DetectorConfig::default()),
                tracker,
                sub,
            }
        }

        fn site(&self, id: u32) -> ProbeSite {
            ProbeSite::new(ExecutionContextId(0), self.sub, OperationId(id))
        }
    }

    fn arg(id: u32, name: &str, value: &str) -> StateChange {
        StateChange {
            id: OperationId(id),
            variable: name.into(),
            value: value.into(),
        }
    }

    #[test]
    fn records_method_with_return() {
        let h = Harness::new();
        let r = &h.recorder;
        r.begin_method(h.site(0), "Id", smallvec![arg(1, "n", "4")]).unwrap();
        r.record_return(h.site(2), Some("4".into())).unwrap();

        let traces = r.collect_completed_traces();
        let root = &traces[&ExecutionContextId(0)];
        assert_eq!(root.name, "Id");
        assert_eq!(root.arguments[0].value, "4");
        assert_eq!(root.return_value().and_then(|r| r.value.as_deref()), Some("4"));
    }

    #[test]
    fn header_values_move_into_next_iteration() {
        let h = Harness::new();
        let r = &h.recorder;
        r.begin_method(h.site(0), "F", Arguments::new()).unwrap();
        r.begin_loop(h.site(1)).unwrap();
        r.record_value(h.site(3), "i", "0".into()).unwrap();
        r.begin_iteration(h.site(2)).unwrap();
        r.record_value(h.site(4), "t", "0".into()).unwrap();
        r.end_iteration(h.site(2)).unwrap();
        r.record_value(h.site(5), "i", "1".into()).unwrap();
        r.end_loop(h.site(1)).unwrap();
        r.record_return(h.site(6), None).unwrap();

        let root = r.collect_completed_traces().swap_remove(&ExecutionContextId(0)).unwrap();
        let Operation::Loop(lp) = &root.operations[0] else {
            panic!("expected loop first, got {:?}", root.operations[0]);
        };
        assert_eq!(lp.iterations.len(), 1);
        assert_eq!(lp.history("i"), vec![HistoryEntry::Value("0".into())]);
        // The leftover iterator write lands after the loop.
        assert!(matches!(&root.operations[1], Operation::StateChange(c) if c.variable == "i" && c.value == "1"));
        assert!(root.return_value().is_none());
    }

    #[test]
    fn histories_pad_skipped_iterations() {
        let h = Harness::new();
        let r = &h.recorder;
        r.begin_method(h.site(0), "F", Arguments::new()).unwrap();
        r.begin_loop(h.site(1)).unwrap();
        for pass in 0..3 {
            r.begin_iteration(h.site(2)).unwrap();
            if pass != 1 {
                r.record_value(h.site(3), "x", pass.to_string()).unwrap();
            }
            r.end_iteration(h.site(2)).unwrap();
        }
        {
            let state = r.contexts.get(&ExecutionContextId(0)).unwrap();
            let Some(Container::Loop(open)) = state.stack.last() else {
                panic!("loop should be open");
            };
            assert_eq!(
                open.histories["x"],
                vec![
                    HistoryEntry::Value("0".into()),
                    HistoryEntry::Skipped,
                    HistoryEntry::Value("2".into()),
                ]
            );
        }
        r.end_loop(h.site(1)).unwrap();
    }

    #[test]
    fn unchanged_loop_is_canceled_as_likely_infinite() {
        let h = Harness::new();
        let r = &h.recorder;
        r.begin_method(h.site(0), "Spin", Arguments::new()).unwrap();
        r.begin_loop(h.site(1)).unwrap();

        r.begin_iteration(h.site(2)).unwrap();
        r.record_value(h.site(3), "x", "1".into()).unwrap();
        r.end_iteration(h.site(2)).unwrap();

        r.begin_iteration(h.site(2)).unwrap();
        r.record_value(h.site(3), "x", "1".into()).unwrap();
        let err = r.end_iteration(h.site(2)).unwrap_err();
        let reason = CancelReason::LikelyInfinite {
            loop_id: OperationId(1),
        };
        assert_eq!(err, ProbeError::Canceled(reason));
        assert_eq!(r.submission().cancellation(), Some(reason));

        // The loop was force-closed into the method.
        let root = r.collect_completed_traces().swap_remove(&ExecutionContextId(0)).unwrap();
        let lp = root.loops().next().unwrap();
        assert_eq!(lp.iterations.len(), 2);
    }

    #[test]
    fn return_inside_nested_loops_closes_them() {
        let h = Harness::new();
        let r = &h.recorder;
        r.begin_method(h.site(0), "Outer", Arguments::new()).unwrap();
        r.begin_method(h.site(10), "Find", Arguments::new()).unwrap();
        r.begin_loop(h.site(11)).unwrap();
        r.begin_iteration(h.site(12)).unwrap();
        r.begin_loop(h.site(13)).unwrap();
        r.begin_iteration(h.site(14)).unwrap();
        r.record_return(h.site(15), Some("7".into())).unwrap();
        r.record_return(h.site(1), None).unwrap();

        let root = r.collect_completed_traces().swap_remove(&ExecutionContextId(0)).unwrap();
        assert_eq!(root.name, "Outer");
        let Operation::MethodCall(find) = &root.operations[0] else {
            panic!("expected nested call");
        };
        let outer_loop = find.loops().next().unwrap();
        assert_eq!(outer_loop.iterations.len(), 1);
        let Operation::Loop(inner) = &outer_loop.iterations[0].operations[0] else {
            panic!("expected inner loop");
        };
        assert_eq!(inner.iterations.len(), 1);
        assert!(matches!(
            inner.iterations[0].operations[0],
            Operation::ReturnValue(ReturnValue { value: Some(ref v), .. }) if v == "7"
        ));
    }

    #[test]
    fn return_does_not_close_caller_loops() {
        let h = Harness::new();
        let r = &h.recorder;
        r.begin_method(h.site(0), "Caller", Arguments::new()).unwrap();
        r.begin_loop(h.site(1)).unwrap();
        r.begin_iteration(h.site(2)).unwrap();
        r.begin_method(h.site(10), "Callee", Arguments::new()).unwrap();
        r.record_return(h.site(11), Some("1".into())).unwrap();
        // Caller's iteration is still open and can be closed normally.
        r.end_iteration(h.site(2)).unwrap();
        r.end_loop(h.site(1)).unwrap();
        r.record_return(h.site(3), None).unwrap();
        assert_eq!(r.collect_completed_traces().len(), 1);
    }

    #[test]
    fn caller_histories_ignore_callee_writes() {
        let h = Harness::new();
        let r = &h.recorder;
        r.begin_method(h.site(0), "Caller", Arguments::new()).unwrap();
        r.begin_loop(h.site(1)).unwrap();
        r.begin_iteration(h.site(2)).unwrap();
        r.begin_method(h.site(10), "Callee", Arguments::new()).unwrap();
        r.record_value(h.site(11), "x", "5".into()).unwrap();
        {
            let state = r.contexts.get(&ExecutionContextId(0)).unwrap();
            let Some(Container::Loop(open)) = state.stack.get(1) else {
                panic!("loop should be open");
            };
            assert!(open.histories.is_empty());
        }
        r.record_return(h.site(12), None).unwrap();
    }

    #[test]
    fn mismatched_close_is_a_violation() {
        let h = Harness::new();
        let r = &h.recorder;
        r.begin_method(h.site(0), "F", Arguments::new()).unwrap();
        r.begin_loop(h.site(1)).unwrap();
        r.begin_iteration(h.site(2)).unwrap();
        let err = r.end_loop(h.site(1)).unwrap_err();
        assert_eq!(
            err,
            ProbeError::Violation(StackViolation::Mismatch {
                probe: ProbeKind::EndLoop,
                expected: ContainerKind::Loop,
                found: ContainerKind::Iteration,
                context: ExecutionContextId(0),
            })
        );
    }

    #[test]
    fn close_on_empty_stack_is_a_violation() {
        let h = Harness::new();
        let err = h.recorder.end_iteration(h.site(2)).unwrap_err();
        assert!(matches!(
            err,
            ProbeError::Violation(StackViolation::EmptyStack { .. })
        ));
    }

    #[test]
    fn stale_probes_are_canceled_without_mutation() {
        let h = Harness::new();
        let r = &h.recorder;
        r.begin_method(h.site(0), "F", Arguments::new()).unwrap();

        let stale = ProbeSite::new(ExecutionContextId(0), SubmissionId(h.sub.0 + 7), OperationId(3));
        assert_eq!(
            r.record_value(stale, "x", "1".into()),
            Err(ProbeError::Canceled(CancelReason::Superseded))
        );

        // Superseding the recorder's own submission makes its probes stale too.
        let _newer = h.tracker.begin("");
        assert_eq!(
            r.record_value(h.site(3), "x", "2".into()),
            Err(ProbeError::Canceled(CancelReason::Superseded))
        );

        let root = r.collect_completed_traces().swap_remove(&ExecutionContextId(0)).unwrap();
        assert!(root.operations.is_empty());
    }

    #[test]
    fn requested_cancellation_stops_at_iteration_boundary() {
        let h = Harness::new();
        let r = &h.recorder;
        r.begin_method(h.site(0), "F", Arguments::new()).unwrap();
        r.begin_loop(h.site(1)).unwrap();
        r.begin_iteration(h.site(2)).unwrap();
        r.record_value(h.site(3), "x", "1".into()).unwrap();
        r.submission().cancel(CancelReason::Requested);
        assert_eq!(
            r.end_iteration(h.site(2)),
            Err(ProbeError::Canceled(CancelReason::Requested))
        );
        let root = r.collect_completed_traces().swap_remove(&ExecutionContextId(0)).unwrap();
        assert_eq!(root.loops().next().unwrap().iterations.len(), 1);
    }

    #[test]
    fn contexts_are_independent() {
        let h = Harness::new();
        let r = &h.recorder;
        let a = ProbeSite::new(ExecutionContextId(0), h.sub, OperationId(0));
        let b = ProbeSite::new(ExecutionContextId(1), h.sub, OperationId(5));
        r.begin_method(a, "A", Arguments::new()).unwrap();
        r.begin_method(b, "B", Arguments::new()).unwrap();
        r.record_return(b, None).unwrap();
        r.record_return(a, None).unwrap();
        let traces = r.collect_completed_traces();
        assert_eq!(traces[&ExecutionContextId(0)].name, "A");
        assert_eq!(traces[&ExecutionContextId(1)].name, "B");
    }

    #[test]
    fn nothing_recorded_yields_no_traces() {
        let h = Harness::new();
        assert!(h.recorder.collect_completed_traces().is_empty());
    }

    #[test]
    fn incomplete_run_unwinds_to_outermost_method() {
        let h = Harness::new();
        let r = &h.recorder;
        r.begin_method(h.site(0), "Outer", Arguments::new()).unwrap();
        r.begin_loop(h.site(1)).unwrap();
        r.begin_iteration(h.site(2)).unwrap();
        r.begin_method(h.site(10), "Inner", Arguments::new()).unwrap();
        let root = r.collect_completed_traces().swap_remove(&ExecutionContextId(0)).unwrap();
        assert_eq!(root.name, "Outer");
        let lp = root.loops().next().unwrap();
        assert!(matches!(&lp.iterations[0].operations[0], Operation::MethodCall(c) if c.name == "Inner"));
    }
}
