//! Instruments real source, runs the printed result against a recorder and
//! checks the traces that come back.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use lumen_check::{
    check_unit, has_errors, CheckOptions, ExecError, Interpreter, InterpreterConfig, Program,
    RunOutcome, RuntimeErrorKind, ENTRY_POINT,
};
use lumen_core::id::{ExecutionContextId, SourceIndex};
use lumen_core::operation::{HistoryEntry, MethodCall, Operation};
use lumen_core::parser::{parse_statements, parse_unit, ParseOptions};
use lumen_instrument::{instrument_project, locate_project, InstrumentOptions};
use lumen_trace::{CancelReason, DetectorConfig, Recorder, Submission, SubmissionTracker};

const MAIN: ExecutionContextId = ExecutionContextId(0);

struct Prepared {
    program: Arc<Program>,
    recorder: Arc<Recorder>,
}

impl Prepared {
    fn run(&self) -> RunOutcome {
        Interpreter::new(
            self.program.clone(),
            self.recorder.clone(),
            InterpreterConfig::default(),
        )
        .run(ENTRY_POINT)
    }

    fn root(&self) -> MethodCall {
        self.recorder
            .collect_completed_traces()
            .get(&MAIN)
            .cloned()
            .expect("main context recorded a root call")
    }

    fn submission(&self) -> Arc<Submission> {
        self.recorder.submission().clone()
    }
}

/// Helper: instrument `source` for a new submission, compile the printed
/// output with `harness` as the entry point, and attach a recorder.
fn prepare(tracker: &SubmissionTracker, source: &str, harness: &str) -> Prepared {
    let submission = tracker.begin(harness);
    let project = instrument_project(
        &[source.to_string()],
        &[],
        &InstrumentOptions::default(),
        &submission,
    )
    .unwrap();

    let options = ParseOptions::default();
    let text = &project.texts()[0];
    let unit = parse_unit(text, &options).unwrap();
    let diagnostics = check_unit(
        &unit,
        CheckOptions {
            allow_probes: true,
            ..CheckOptions::default()
        },
    );
    assert!(!has_errors(&diagnostics), "{diagnostics:?}\n{text}");

    let mut program = Program::link(&[(SourceIndex(0), unit)]);
    program.add_entry(SourceIndex(1), parse_statements(harness, &options).unwrap());
    Prepared {
        program: Arc::new(program),
        recorder: Arc::new(Recorder::new(submission, DetectorConfig::default())),
    }
}

fn changes(ops: &[Operation]) -> Vec<(String, String)> {
    ops.iter()
        .filter_map(|op| match op {
            Operation::StateChange(change) => {
                Some((change.variable.clone(), change.value.clone()))
            }
            _ => None,
        })
        .collect()
}

fn pair(name: &str, value: &str) -> (String, String) {
    (name.to_string(), value.to_string())
}

/// Cancels `submission` after a delay, from another thread.
fn cancel_later(submission: Arc<Submission>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(150));
        submission.cancel(CancelReason::Requested);
    })
}

#[test]
fn sum_end_to_end() {
    let tracker = SubmissionTracker::new();
    let prepared = prepare(
        &tracker,
        "int Sum(int n) { int t = 0; for (int i = 0; i < n; i++) { t += i; } return t; }",
        "Sum(3);",
    );
    assert!(prepared.run().result.is_ok());

    let root = prepared.root();
    assert_eq!(root.name, "Sum");
    assert_eq!(root.arguments[0].value, "3");
    let loops: Vec<_> = root.loops().collect();
    assert_eq!(loops.len(), 1);
    assert_eq!(loops[0].iterations.len(), 3);
    assert_eq!(
        loops[0].history("t").last().and_then(HistoryEntry::value),
        Some("3")
    );
    assert_eq!(
        root.return_value().and_then(|ret| ret.value.as_deref()),
        Some("3")
    );
}

#[test]
fn postfix_in_assignment_records_new_value_then_target() {
    let tracker = SubmissionTracker::new();
    let prepared = prepare(
        &tracker,
        "void M() { int x = 0; int y = 0; x = 5; y = x++; }",
        "M();",
    );
    assert!(prepared.run().result.is_ok());
    let recorded = changes(&prepared.root().operations);
    assert_eq!(
        recorded[2..],
        [pair("x", "5"), pair("x", "6"), pair("y", "5")]
    );
}

#[test]
fn skipped_iterations_keep_histories_aligned() {
    let tracker = SubmissionTracker::new();
    let prepared = prepare(
        &tracker,
        "int M() { int s = 0; for (int i = 0; i < 3; i++) { if (i != 1) { s = i; } } return s; }",
        "M();",
    );
    assert!(prepared.run().result.is_ok());
    let root = prepared.root();
    let history = root.loops().next().unwrap().history("s");
    assert_eq!(
        history,
        [
            HistoryEntry::Value("0".into()),
            HistoryEntry::Skipped,
            HistoryEntry::Value("2".into()),
        ]
    );
}

#[test]
fn constant_assignment_loop_is_flagged_after_two_iterations() {
    let tracker = SubmissionTracker::new();
    let prepared = prepare(
        &tracker,
        "void Spin() { int x = 0; while (true) { x = 1; } }",
        "Spin();",
    );
    let outcome = prepared.run();
    assert!(
        matches!(
            outcome.result,
            Err(ExecError::Canceled(CancelReason::LikelyInfinite { .. }))
        ),
        "{:?}",
        outcome.result
    );
    let root = prepared.root();
    assert_eq!(root.loops().next().unwrap().iterations.len(), 2);
}

#[test]
fn counting_loop_is_never_flagged() {
    let tracker = SubmissionTracker::new();
    let prepared = prepare(
        &tracker,
        "void Count() { int x = 0; while (true) { x++; } }",
        "Count();",
    );
    let canceller = cancel_later(prepared.submission());
    let outcome = prepared.run();
    canceller.join().unwrap();
    assert!(
        matches!(
            outcome.result,
            Err(ExecError::Canceled(CancelReason::Requested))
        ),
        "{:?}",
        outcome.result
    );
    assert!(prepared.root().loops().next().unwrap().iterations.len() > 2);
}

#[test]
fn calling_loop_is_never_flagged() {
    let tracker = SubmissionTracker::new();
    let prepared = prepare(
        &tracker,
        "void Foo() { int z = 1; } void Poll() { while (true) { Foo(); } }",
        "Poll();",
    );
    let canceller = cancel_later(prepared.submission());
    let outcome = prepared.run();
    canceller.join().unwrap();
    assert!(matches!(
        outcome.result,
        Err(ExecError::Canceled(CancelReason::Requested))
    ));
}

#[test]
fn superseded_run_leaves_no_trace() {
    let tracker = SubmissionTracker::new();
    let stale = prepare(
        &tracker,
        "int Twice(int n) { return n * 2; }",
        "Twice(4);",
    );
    let current = tracker.begin("Twice(5);");
    assert!(!stale.submission().is_current());

    let outcome = stale.run();
    assert!(matches!(
        outcome.result,
        Err(ExecError::Canceled(CancelReason::Superseded))
    ));
    assert!(stale.recorder.collect_completed_traces().is_empty());
    assert!(current.is_current());
}

#[test]
fn return_inside_loops_closes_them() {
    let tracker = SubmissionTracker::new();
    let prepared = prepare(
        &tracker,
        r#"
            void Find(int[] a) {
                foreach (int v in a) {
                    for (int j = 0; j < 5; j++) {
                        if (v == 2 && j == 1) return;
                    }
                }
            }
        "#,
        "Find(new int[] { 1, 2, 3 });",
    );
    assert!(prepared.run().result.is_ok());
    let root = prepared.root();
    let outer = root.loops().next().unwrap();
    assert_eq!(outer.iterations.len(), 2);
    let items: Vec<_> = outer.history("v").iter().map(|e| e.to_string()).collect();
    assert_eq!(items, ["1", "2"]);
    // The second pass of the outer loop holds the inner loop cut short.
    let inner = outer.iterations[1]
        .operations
        .iter()
        .find_map(|op| match op {
            Operation::Loop(lp) => Some(lp),
            _ => None,
        })
        .unwrap();
    assert_eq!(inner.iterations.len(), 2);
}

#[test]
fn nested_calls_are_children_of_the_caller() {
    let tracker = SubmissionTracker::new();
    let prepared = prepare(
        &tracker,
        "int Fib(int n) { if (n < 2) return n; return Fib(n - 1) + Fib(n - 2); }",
        "Fib(3);",
    );
    assert!(prepared.run().result.is_ok());
    let root = prepared.root();
    let calls: Vec<_> = root
        .operations
        .iter()
        .filter_map(|op| match op {
            Operation::MethodCall(call) => Some(call.arguments[0].value.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(calls, ["2", "1"]);
    assert_eq!(
        root.return_value().and_then(|ret| ret.value.as_deref()),
        Some("2")
    );
}

#[test]
fn runtime_failure_keeps_the_partial_trace() {
    let tracker = SubmissionTracker::new();
    let prepared = prepare(
        &tracker,
        "int Div(int a, int b) { int c = a + 1; int q = c / b; return q; }",
        "Div(1, 0);",
    );
    let outcome = prepared.run();
    match outcome.result {
        Err(ExecError::Runtime(error)) => {
            assert_eq!(error.kind, RuntimeErrorKind::DivideByZero);
            assert_eq!(error.method, "Div");
        }
        other => panic!("expected a runtime error, got {other:?}"),
    }
    let root = prepared.root();
    assert_eq!(changes(&root.operations), [pair("c", "2")]);
    assert!(root.return_value().is_none());
}

#[test]
fn reinstrumenting_yields_the_same_location_map() {
    let source = "int Sum(int n) { int t = 0; for (int i = 0; i < n; i++) { t += i; } return t; }"
        .to_string();
    let options = InstrumentOptions::default();
    let tracker = SubmissionTracker::new();
    let first = instrument_project(&[source.clone()], &[], &options, &tracker.begin("")).unwrap();
    let second = instrument_project(&[source.clone()], &[], &options, &tracker.begin("")).unwrap();
    assert_eq!(first.locations, second.locations);
    assert_ne!(first.submission, second.submission);
    assert_eq!(locate_project(&[source], &[], &options).unwrap(), first.locations);
}

#[test]
fn compile_errors_reject_the_whole_project() {
    let tracker = SubmissionTracker::new();
    let submission = tracker.begin("");
    let options = InstrumentOptions::default();

    let rejected = instrument_project(
        &["void A() { int x = 1; }".into(), "void B() { y = 2; }".into()],
        &[],
        &options,
        &submission,
    )
    .unwrap_err();
    assert_eq!(rejected.diagnostics.len(), 1);
    assert_eq!(rejected.diagnostics[0].source, SourceIndex(1));
    assert_eq!(submission.operation_ids_issued(), 0);

    let rejected =
        instrument_project(&["void A( {".into()], &[], &options, &submission).unwrap_err();
    assert!(rejected.to_string().contains("1 error"));
}

#[test]
fn references_are_checked_but_not_instrumented() {
    let tracker = SubmissionTracker::new();
    let project = instrument_project(
        &["int Use() { return Helper(2); }".into()],
        &["int Helper(int n) { return n + 1; }".into()],
        &InstrumentOptions::default(),
        &tracker.begin(""),
    )
    .unwrap();
    assert_eq!(project.units.len(), 1);
    assert!(project.texts()[0].contains("__return(1, 1, Helper(2))"));
}

#[test]
fn defines_and_unsafe_follow_options() {
    let source = "int M() {\n#if FAST\nunsafe { return 1; }\n#else\nreturn 2;\n#endif\n}".to_string();
    let tracker = SubmissionTracker::new();
    let plain = instrument_project(
        &[source.clone()],
        &[],
        &InstrumentOptions::default(),
        &tracker.begin(""),
    )
    .unwrap();
    assert!(plain.texts()[0].contains("return __return(1, 1, 2);"));

    let rejected = instrument_project(
        &[source.clone()],
        &[],
        &InstrumentOptions {
            defines: vec!["FAST".into()],
            allow_unsafe: false,
        },
        &tracker.begin(""),
    );
    assert!(rejected.is_err());

    let fast = instrument_project(
        &[source],
        &[],
        &InstrumentOptions {
            defines: vec!["FAST".into()],
            allow_unsafe: true,
        },
        &tracker.begin(""),
    )
    .unwrap();
    assert!(fast.texts()[0].contains("unsafe"));
}
