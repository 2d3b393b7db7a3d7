//! The sandbox evaluator: compile, run behind an isolation boundary, collect
//! the trace.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;

use lumen_check::{ExecError, InterpreterConfig, Program, RuntimeError, ENTRY_POINT};
use lumen_core::id::{ExecutionContextId, SubmissionId};
use lumen_core::operation::MethodCall;
use lumen_trace::{CancelReason, DetectorConfig, ProbeSink, Recorder, Submission};

use crate::compiler::{compile, read_artifact, write_artifact, CompileInput};
use crate::domain::{DomainConfig, DomainLease, DomainPool};
use crate::error::{EvaluationError, SandboxError};
use crate::executor::{IsolatedExecutor, ThreadExecutor, UnloadGuard};
use crate::project::{Project, SourceText};

/// Configuration for [`Evaluator`].
#[derive(Debug, Clone, Default)]
pub struct EvaluatorConfig {
    pub interpreter: InterpreterConfig,
    pub detector: DetectorConfig,
    pub domain: DomainConfig,
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// A runtime failure in user code, positioned in the text that ran.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuntimeFailure {
    pub message: String,
    pub method: String,
    /// Name of the source the failure is in, `<harness>` for the harness.
    pub source: String,
    pub line: u32,
    pub column: u32,
}

/// Why a run that produced a trace did not complete.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunFailure {
    Canceled { reason: CancelReason },
    Runtime(RuntimeFailure),
}

/// Everything one evaluation produced.
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub submission: SubmissionId,
    /// One root call per execution context that recorded anything.
    pub traces: IndexMap<ExecutionContextId, MethodCall>,
    /// Lines written by `print`, per execution context.
    pub output: IndexMap<ExecutionContextId, Vec<String>>,
    /// `None` when the harness ran to completion.
    pub failure: Option<RunFailure>,
}

impl Evaluation {
    /// The canonical root: the main context's trace, else the first one.
    pub fn root(&self) -> Option<&MethodCall> {
        self.traces
            .get(&ExecutionContextId(0))
            .or_else(|| self.traces.values().next())
    }

    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

pub struct Evaluator {
    config: EvaluatorConfig,
    pool: DomainPool,
    executor: Arc<dyn IsolatedExecutor>,
}

impl Evaluator {
    pub fn new(config: EvaluatorConfig) -> Self {
        let executor = Arc::new(ThreadExecutor::new(config.interpreter));
        Self::with_executor(config, executor)
    }

    pub fn with_executor(config: EvaluatorConfig, executor: Arc<dyn IsolatedExecutor>) -> Self {
        Evaluator {
            pool: DomainPool::new(config.domain.clone()),
            config,
            executor,
        }
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    pub fn pool(&self) -> &DomainPool {
        &self.pool
    }

    /// Compiles `project` (already instrumented for `submission`) together
    /// with the harness statements and runs them.
    ///
    /// Compile errors return [`EvaluationError::Compile`] and nothing runs.
    /// A run cut short by a runtime error or a cancellation still yields an
    /// [`Evaluation`] carrying the partial trace.
    pub fn evaluate(
        &self,
        project: &Project,
        harness: &str,
        submission: Arc<Submission>,
    ) -> Result<Evaluation, EvaluationError> {
        let lease = self.pool.lease()?;
        let references = copy_references(&lease, project)?;
        let input = CompileInput {
            sources: &project.sources,
            references: &references,
            harness,
            options: &project.options,
        };
        let program = load_program(&lease, &input)?;

        let loaded = self.executor.load(lease, program)?;
        let guard = UnloadGuard::new(self.executor.as_ref(), loaded);
        let recorder = Arc::new(Recorder::new(Arc::clone(&submission), self.config.detector));
        let sink: Arc<dyn ProbeSink> = recorder.clone();
        let outcome = self.executor.execute(guard.loaded(), ENTRY_POINT, sink)?;
        drop(guard);

        let traces = recorder.collect_completed_traces();
        submission.set_traces(traces.clone());

        let failure = match outcome.result {
            Ok(_) => None,
            Err(ExecError::Canceled(reason)) => {
                tracing::debug!(submission = %submission.id(), %reason, "evaluation canceled");
                Some(RunFailure::Canceled { reason })
            }
            Err(ExecError::Runtime(error)) => Some(RunFailure::Runtime(runtime_failure(
                &input, error,
            ))),
            Err(ExecError::Violation(violation)) => {
                tracing::error!(submission = %submission.id(), %violation, "trace stack violation");
                return Err(EvaluationError::Violation(violation));
            }
        };
        tracing::debug!(
            submission = %submission.id(),
            contexts = traces.len(),
            complete = failure.is_none(),
            "evaluation finished"
        );
        Ok(Evaluation {
            submission: submission.id(),
            traces,
            output: outcome.output,
            failure,
        })
    }

    /// Retires the current isolation domain.
    pub fn retire_domain(&self) {
        self.pool.retire();
    }
}

fn copy_references(lease: &DomainLease, project: &Project) -> Result<Vec<SourceText>, SandboxError> {
    project
        .references
        .iter()
        .enumerate()
        .map(|(index, path)| {
            let copy = lease.copy_reference(index, path)?;
            Ok(SourceText::new(path.display().to_string(), copy.text))
        })
        .collect()
}

/// The compiled program for `input`: from the domain's cache, from an
/// artifact already on disk, or freshly compiled.
fn load_program(lease: &DomainLease, input: &CompileInput<'_>) -> Result<Arc<Program>, EvaluationError> {
    let fingerprint = input.fingerprint();
    if let Some(program) = lease.cached(&fingerprint) {
        tracing::trace!(%fingerprint, "compiled program cache hit");
        return Ok(program);
    }
    let path = lease.artifact_path(&fingerprint);
    let program = if path.exists() {
        read_artifact(&path)?
    } else {
        let compiled = compile(input)?;
        write_artifact(&path, &compiled.program)?;
        compiled.program
    };
    let program = Arc::new(program);
    lease.cache(fingerprint, Arc::clone(&program));
    Ok(program)
}

fn runtime_failure(input: &CompileInput<'_>, error: RuntimeError) -> RuntimeFailure {
    let (source, line, column) = match input.locate(error.source_index, error.span) {
        Some((name, at)) => (name.to_string(), at.line, at.column),
        None => (error.source_index.to_string(), 0, 0),
    };
    RuntimeFailure {
        message: error.kind.to_string(),
        method: error.method,
        source,
        line,
        column,
    }
}
