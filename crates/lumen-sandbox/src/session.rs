//! Fire-and-supersede evaluation of a project that keeps changing.
//!
//! Every [`LiveSession::submit`] starts a new submission, which cancels the
//! one before it, and runs instrumentation and evaluation on tokio's blocking
//! pool. Results are published on a watch channel, and only while their
//! submission is still current, so subscribers never see a stale trace
//! replace a newer one.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use lumen_core::id::SubmissionId;
use lumen_instrument::{instrument_project, LocationMap};
use lumen_trace::{CancelReason, Submission, SubmissionTracker};

use crate::error::SessionError;
use crate::evaluator::{Evaluation, Evaluator};
use crate::project::{Project, SourceText};

/// The outcome of one submission.
#[derive(Debug)]
pub struct Published {
    pub submission: SubmissionId,
    /// Id to source-location map of the instrumented sources; empty when
    /// the project was rejected.
    pub locations: LocationMap,
    pub result: Result<Evaluation, SessionError>,
}

pub struct LiveSession {
    tracker: Arc<SubmissionTracker>,
    evaluator: Arc<Evaluator>,
    results: Arc<watch::Sender<Option<Arc<Published>>>>,
}

impl LiveSession {
    pub fn new(evaluator: Evaluator) -> Self {
        let (results, _) = watch::channel(None);
        LiveSession {
            tracker: Arc::new(SubmissionTracker::new()),
            evaluator: Arc::new(evaluator),
            results: Arc::new(results),
        }
    }

    pub fn tracker(&self) -> &SubmissionTracker {
        &self.tracker
    }

    /// Starts evaluating `project` against `harness` in the background.
    ///
    /// The returned handle resolves to the published outcome, or `None` when
    /// a newer submission superseded this one first. Must be called inside a
    /// tokio runtime.
    pub fn submit(
        &self,
        project: Project,
        harness: impl Into<String>,
    ) -> JoinHandle<Option<Arc<Published>>> {
        let harness = harness.into();
        let submission = self.tracker.begin(harness.clone());
        let evaluator = Arc::clone(&self.evaluator);
        let results = Arc::clone(&self.results);
        tracing::debug!(submission = %submission.id(), "submission queued");

        tokio::task::spawn_blocking(move || {
            let published = Arc::new(run(&evaluator, &project, &harness, &submission));
            let current = results.send_if_modified(|slot| {
                if submission.is_current() {
                    *slot = Some(Arc::clone(&published));
                    true
                } else {
                    false
                }
            });
            if current {
                tracing::info!(submission = %submission.id(), "result published");
                Some(published)
            } else {
                tracing::debug!(submission = %submission.id(), "superseded result discarded");
                None
            }
        })
    }

    /// Receives every published outcome, starting with the latest.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Published>>> {
        self.results.subscribe()
    }

    pub fn latest(&self) -> Option<Arc<Published>> {
        self.results.borrow().clone()
    }

    /// Asks the in-flight submission, if any, to stop at its next probe.
    pub fn cancel(&self) {
        if let Some(active) = self.tracker.active() {
            active.cancel(CancelReason::Requested);
        }
    }
}

fn run(evaluator: &Evaluator, project: &Project, harness: &str, submission: &Arc<Submission>) -> Published {
    let mut locations = LocationMap::default();
    let result = instrument_and_evaluate(evaluator, project, harness, submission, &mut locations);
    Published {
        submission: submission.id(),
        locations,
        result,
    }
}

fn instrument_and_evaluate(
    evaluator: &Evaluator,
    project: &Project,
    harness: &str,
    submission: &Arc<Submission>,
    locations: &mut LocationMap,
) -> Result<Evaluation, SessionError> {
    let texts: Vec<String> = project.sources.iter().map(|s| s.text.clone()).collect();
    let references: Vec<String> = project
        .read_references()?
        .into_iter()
        .map(|reference| reference.text)
        .collect();
    let instrumented = instrument_project(
        &texts,
        &references,
        &project.instrument_options(),
        submission,
    )?;
    let sources = project
        .sources
        .iter()
        .zip(instrumented.texts())
        .map(|(source, text)| SourceText::new(source.name.clone(), text))
        .collect();
    *locations = instrumented.locations;
    let evaluation = evaluator.evaluate(&project.with_sources(sources), harness, Arc::clone(submission))?;
    Ok(evaluation)
}
