//! Interpreter configuration, shared run state and the run entry point.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use indexmap::IndexMap;
use parking_lot::Mutex;

use lumen_core::id::{ExecutionContextId, SourceIndex};
use lumen_core::span::Span;
use lumen_trace::ProbeSink;

use super::error::{ExecError, RuntimeError, RuntimeErrorKind};
use super::exec::{Context, Slot};
use super::value::Value;
use crate::program::Program;

/// Context id of the thread that runs the entry method.
pub const MAIN_CONTEXT: ExecutionContextId = ExecutionContextId(0);

/// Configuration for the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpreterConfig {
    /// Maximum nesting of user method calls before the run fails.
    pub max_call_depth: usize,
    /// Stack size of threads started by `spawn`.
    pub thread_stack_size: usize,
    /// Largest array `new T[n]` may allocate.
    pub max_array_length: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        InterpreterConfig {
            max_call_depth: 256,
            thread_stack_size: 64 * 1024 * 1024,
            max_array_length: 1 << 24,
        }
    }
}

/// Result of one run: the entry method's value or the first failure, plus
/// everything `print` wrote, per execution context.
#[derive(Debug)]
pub struct RunOutcome {
    pub result: Result<Value, ExecError>,
    pub output: IndexMap<ExecutionContextId, Vec<String>>,
}

/// State every execution context of one run shares.
pub(crate) struct Shared {
    pub(crate) program: Arc<Program>,
    pub(crate) sink: Arc<dyn ProbeSink>,
    pub(crate) config: InterpreterConfig,
    pub(crate) statics: Mutex<HashMap<String, Slot>>,
    pub(crate) output: Mutex<IndexMap<ExecutionContextId, Vec<String>>>,
    pub(crate) spawned: Mutex<Vec<(String, JoinHandle<()>)>>,
    next_context: AtomicU64,
    halted: AtomicBool,
    first_error: Mutex<Option<ExecError>>,
}

impl Shared {
    pub(crate) fn next_context(&self) -> ExecutionContextId {
        ExecutionContextId(self.next_context.fetch_add(1, Ordering::SeqCst))
    }

    /// Records `error` if it is the run's first and tells every other
    /// context to stop at its next loop step.
    pub(crate) fn fail(&self, error: ExecError) {
        {
            let mut first = self.first_error.lock();
            if first.is_none() {
                *first = Some(error);
            }
        }
        self.halted.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    pub(crate) fn print(&self, context: ExecutionContextId, line: String) {
        self.output.lock().entry(context).or_default().push(line);
    }
}

/// Tree-walking interpreter over a linked [`Program`].
///
/// Probe statements and expressions report to the [`ProbeSink`]; a refusal
/// from the sink stops the run with [`ExecError::Canceled`] or
/// [`ExecError::Violation`].
pub struct Interpreter {
    program: Arc<Program>,
    sink: Arc<dyn ProbeSink>,
    config: InterpreterConfig,
}

impl Interpreter {
    pub fn new(program: Arc<Program>, sink: Arc<dyn ProbeSink>, config: InterpreterConfig) -> Self {
        Interpreter {
            program,
            sink,
            config,
        }
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    /// Initializes statics, runs `entry` with no arguments on the calling
    /// thread, then joins every spawned context. Statics start fresh on
    /// every call.
    pub fn run(&self, entry: &str) -> RunOutcome {
        let shared = Arc::new(Shared {
            program: Arc::clone(&self.program),
            sink: Arc::clone(&self.sink),
            config: self.config,
            statics: Mutex::new(HashMap::new()),
            output: Mutex::new(IndexMap::new()),
            spawned: Mutex::new(Vec::new()),
            next_context: AtomicU64::new(MAIN_CONTEXT.0 + 1),
            halted: AtomicBool::new(false),
            first_error: Mutex::new(None),
        });
        tracing::debug!(entry, "interpreter run starting");

        let main = Context::new(Arc::clone(&shared), MAIN_CONTEXT);
        let value = main
            .init_statics()
            .and_then(|()| main.run_method(entry, Vec::new()));
        if let Err(error) = &value {
            shared.fail(error.clone());
        }

        // Spawned contexts may spawn more; drain until none are left.
        loop {
            let next = shared.spawned.lock().pop();
            let Some((method, handle)) = next else {
                break;
            };
            if handle.join().is_err() {
                shared.fail(ExecError::Runtime(RuntimeError {
                    kind: RuntimeErrorKind::Internal {
                        message: "spawned execution context panicked".to_string(),
                    },
                    method,
                    source_index: SourceIndex(0),
                    span: Span::default(),
                }));
            }
        }

        let result = match shared.first_error.lock().take() {
            Some(error) => Err(error),
            None => value,
        };
        match &result {
            Ok(_) => tracing::debug!(entry, "interpreter run finished"),
            Err(error) if error.is_cancellation() => {
                tracing::debug!(entry, %error, "interpreter run canceled")
            }
            Err(error) => tracing::debug!(entry, %error, "interpreter run failed"),
        }
        let output = std::mem::take(&mut *shared.output.lock());
        RunOutcome { result, output }
    }
}
