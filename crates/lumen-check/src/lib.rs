//! Compile checking, linking and execution of Lumen programs.
//!
//! [`checker`] produces the diagnostics that decide whether a project
//! compiles. [`program`] links checked units into one [`Program`]. The
//! [`interpreter`] runs a program, reporting probe events to a
//! [`ProbeSink`](lumen_trace::ProbeSink).

pub mod builtins;
pub mod checker;
pub mod diagnostics;
pub mod flow;
pub mod interpreter;
pub mod program;

pub use builtins::Builtin;
pub use checker::{check_program, check_unit, CheckOptions, EntryBody};
pub use diagnostics::{has_errors, Diagnostic, DiagnosticKind, Severity};
pub use interpreter::{
    ExecError, Interpreter, InterpreterConfig, RunOutcome, RuntimeError, RuntimeErrorKind, Value,
};
pub use program::{LinkedMethod, LinkedStatic, Program, ENTRY_POINT};
