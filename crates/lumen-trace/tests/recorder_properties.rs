//! Structural properties of recorded traces under arbitrary well-nested
//! probe sequences, and isolation between concurrent contexts.

use std::sync::Arc;

use lumen_core::id::{ExecutionContextId, OperationId, SubmissionId};
use lumen_core::operation::{Arguments, Operation};
use lumen_trace::{DetectorConfig, ProbeSink, ProbeSite, Recorder, SubmissionTracker};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Shape {
    Value(u8),
    Loop(Vec<Vec<Shape>>),
    Call(Vec<Shape>),
}

fn shape() -> impl Strategy<Value = Shape> {
    let leaf = any::<u8>().prop_map(Shape::Value);
    leaf.prop_recursive(4, 48, 4, |inner| {
        prop_oneof![
            prop::collection::vec(prop::collection::vec(inner.clone(), 0..4), 0..4)
                .prop_map(Shape::Loop),
            prop::collection::vec(inner, 0..4).prop_map(Shape::Call),
        ]
    })
}

struct Driver<'a> {
    recorder: &'a Recorder,
    context: ExecutionContextId,
    submission: SubmissionId,
    next: u32,
    loops_opened: usize,
}

impl Driver<'_> {
    fn site(&mut self) -> ProbeSite {
        self.next += 1;
        ProbeSite::new(self.context, self.submission, OperationId(self.next))
    }

    fn run(&mut self, shapes: &[Shape]) {
        for shape in shapes {
            match shape {
                Shape::Value(v) => {
                    let site = self.site();
                    self.recorder.record_value(site, "v", v.to_string()).unwrap();
                }
                Shape::Loop(iterations) => {
                    self.loops_opened += 1;
                    let loop_site = self.site();
                    let iter_site = self.site();
                    self.recorder.begin_loop(loop_site).unwrap();
                    for body in iterations {
                        self.recorder.begin_iteration(iter_site).unwrap();
                        self.run(body);
                        self.recorder.end_iteration(iter_site).unwrap();
                    }
                    self.recorder.end_loop(loop_site).unwrap();
                }
                Shape::Call(body) => {
                    let site = self.site();
                    self.recorder.begin_method(site, "Call", Arguments::new()).unwrap();
                    self.run(body);
                    let exit = self.site();
                    self.recorder.record_return(exit, None).unwrap();
                }
            }
        }
    }
}

fn recorder() -> Recorder {
    let tracker = SubmissionTracker::new();
    let submission = tracker.begin("");
    Recorder::new(
        submission,
        DetectorConfig {
            enabled: false,
            ..DetectorConfig::default()
        },
    )
}

proptest! {
    #[test]
    fn every_loop_open_has_one_close(body in prop::collection::vec(shape(), 0..6)) {
        let recorder = recorder();
        let submission = recorder.submission().id();
        let mut driver = Driver {
            recorder: &recorder,
            context: ExecutionContextId(0),
            submission,
            next: 0,
            loops_opened: 0,
        };
        let root = driver.site();
        recorder.begin_method(root, "Main", Arguments::new()).unwrap();
        driver.run(&body);
        let exit = driver.site();
        recorder.record_return(exit, Some("0".into())).unwrap();
        let loops_opened = driver.loops_opened;

        let traces = recorder.collect_completed_traces();
        prop_assert_eq!(traces.len(), 1);
        let root = Operation::MethodCall(traces[&ExecutionContextId(0)].clone());

        let mut loops_recorded = 0;
        root.walk(&mut |op| {
            if matches!(op, Operation::Loop(_)) {
                loops_recorded += 1;
            }
        });
        prop_assert_eq!(loops_recorded, loops_opened);
    }
}

#[test]
fn concurrent_contexts_build_separate_trees() {
    let recorder = Arc::new(recorder());
    let submission = recorder.submission().id();

    let handles: Vec<_> = (0..4u64)
        .map(|n| {
            let recorder = Arc::clone(&recorder);
            std::thread::spawn(move || {
                let site = |id| ProbeSite::new(ExecutionContextId(n), submission, OperationId(id));
                recorder
                    .begin_method(site(0), &format!("Worker{n}"), Arguments::new())
                    .unwrap();
                recorder.begin_loop(site(1)).unwrap();
                for i in 0..100 {
                    recorder.begin_iteration(site(2)).unwrap();
                    recorder.record_value(site(3), "i", i.to_string()).unwrap();
                    recorder.end_iteration(site(2)).unwrap();
                }
                recorder.end_loop(site(1)).unwrap();
                recorder.record_return(site(4), None).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let traces = recorder.collect_completed_traces();
    assert_eq!(traces.len(), 4);
    for (context, root) in &traces {
        assert_eq!(root.name, format!("Worker{}", context.0));
        let lp = root.loops().next().unwrap();
        assert_eq!(lp.iterations.len(), 100);
        assert_eq!(lp.history("i").last().and_then(|h| h.value()), Some("99"));
    }
}
