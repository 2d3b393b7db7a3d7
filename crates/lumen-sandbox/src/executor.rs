//! Running a loaded program behind an isolation boundary.
//!
//! [`IsolatedExecutor`] is the seam between the evaluator and whatever
//! actually hosts user code. [`ThreadExecutor`] runs the interpreter on a
//! dedicated thread with a large stack and turns a panic into a
//! [`SandboxError::Executor`] instead of unwinding into the caller.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use lumen_check::{Interpreter, InterpreterConfig, Program, RunOutcome};
use lumen_trace::ProbeSink;

use crate::domain::DomainLease;
use crate::error::SandboxError;

/// A program made ready to run inside one domain.
#[derive(Debug, Clone)]
pub struct LoadedProgram {
    pub program: Arc<Program>,
    pub lease: DomainLease,
}

pub trait IsolatedExecutor: Send + Sync {
    /// Prepares `program` for execution inside the leased domain.
    fn load(&self, lease: DomainLease, program: Arc<Program>)
        -> Result<LoadedProgram, SandboxError>;

    /// Runs `entry`, reporting probe events to `sink`.
    fn execute(
        &self,
        loaded: &LoadedProgram,
        entry: &str,
        sink: Arc<dyn ProbeSink>,
    ) -> Result<RunOutcome, SandboxError>;

    /// Releases whatever `load` acquired.
    fn unload(&self, loaded: &LoadedProgram);
}

/// Calls [`IsolatedExecutor::unload`] when dropped, whatever path the
/// execution took.
pub struct UnloadGuard<'a> {
    executor: &'a dyn IsolatedExecutor,
    loaded: LoadedProgram,
}

impl<'a> UnloadGuard<'a> {
    pub fn new(executor: &'a dyn IsolatedExecutor, loaded: LoadedProgram) -> Self {
        UnloadGuard { executor, loaded }
    }

    pub fn loaded(&self) -> &LoadedProgram {
        &self.loaded
    }
}

impl Drop for UnloadGuard<'_> {
    fn drop(&mut self) {
        self.executor.unload(&self.loaded);
    }
}

// ---------------------------------------------------------------------------
// Thread executor
// ---------------------------------------------------------------------------

/// Runs each execution on its own named thread.
#[derive(Debug, Clone, Default)]
pub struct ThreadExecutor {
    config: InterpreterConfig,
}

impl ThreadExecutor {
    pub fn new(config: InterpreterConfig) -> Self {
        ThreadExecutor { config }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "user code panicked".to_string()
    }
}

impl IsolatedExecutor for ThreadExecutor {
    fn load(
        &self,
        lease: DomainLease,
        program: Arc<Program>,
    ) -> Result<LoadedProgram, SandboxError> {
        Ok(LoadedProgram { program, lease })
    }

    fn execute(
        &self,
        loaded: &LoadedProgram,
        entry: &str,
        sink: Arc<dyn ProbeSink>,
    ) -> Result<RunOutcome, SandboxError> {
        let interpreter = Interpreter::new(Arc::clone(&loaded.program), sink, self.config);
        let entry = entry.to_string();
        let domain = loaded.lease.id();
        tracing::debug!(%domain, entry = %entry, "execution starting");

        let handle = thread::Builder::new()
            .name(format!("lumen-exec-{domain}"))
            .stack_size(self.config.thread_stack_size)
            .spawn(move || panic::catch_unwind(AssertUnwindSafe(|| interpreter.run(&entry))))?;
        let outcome = match handle.join() {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(payload)) | Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(%domain, %message, "execution panicked");
                return Err(SandboxError::Executor(message));
            }
        };
        tracing::debug!(%domain, ok = outcome.result.is_ok(), "execution finished");
        Ok(outcome)
    }

    fn unload(&self, loaded: &LoadedProgram) {
        tracing::trace!(domain = %loaded.lease.id(), "program unloaded");
    }
}
