//! Lumen core: source language front end and the Operation Model.
//!
//! Everything here is pure data and pure functions. Preprocessing, lexing,
//! parsing and printing of Lumen source, the ids shared by instrumentation
//! and recording, and the trace records an instrumented run produces.

pub mod ast;
pub mod error;
pub mod id;
pub mod lexer;
pub mod operation;
pub mod parser;
pub mod preprocess;
pub mod printer;
pub mod span;

// Re-export commonly used types
pub use error::ParseError;
pub use id::{ExecutionContextId, OperationId, SourceIndex, SubmissionId};
pub use operation::{
    Arguments, HistoryEntry, Loop, LoopIteration, MethodCall, Operation, ReturnValue, StateChange,
};
pub use parser::{parse_expression, parse_statements, parse_unit, ParseOptions};
pub use printer::{print_expr, print_statements, print_unit};
pub use span::{LineColumn, LineIndex, Span, Spanned};
