//! Sandboxed evaluation of instrumented Lumen projects.
//!
//! The [`Evaluator`] compiles a project's sources, its references and a
//! harness into one program, runs the harness as the parameterless entry
//! method behind an isolation boundary, and returns the recorded trace.
//! [`LiveSession`] layers fire-and-supersede submission on top.
//!
//! # Modules
//!
//! - [`project`] -- Sources, references and compiler options
//! - [`compiler`] -- Parsing, checking and linking; artifacts and fingerprints
//! - [`optimize`] -- Constant folding for optimized builds
//! - [`domain`] -- Isolation domains with temp storage, reused then retired
//! - [`executor`] -- The isolated executor seam and its thread-backed version
//! - [`evaluator`] -- Compile, execute, collect
//! - [`session`] -- Fire-and-supersede submissions with a watch channel
//! - [`harness`] -- Example harness generation
//! - [`error`] -- Error types

pub mod compiler;
pub mod domain;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod harness;
pub mod optimize;
pub mod project;
pub mod session;

pub use compiler::{compile, CompileInput, Compiled, Fingerprint, HARNESS_SOURCE};
pub use domain::{DomainConfig, DomainId, DomainLease, DomainPool, IsolationDomain, ReferenceCopy};
pub use error::{CompileMessage, EvaluationError, SandboxError, SessionError};
pub use evaluator::{Evaluation, Evaluator, EvaluatorConfig, RunFailure, RuntimeFailure};
pub use executor::{IsolatedExecutor, LoadedProgram, ThreadExecutor, UnloadGuard};
pub use harness::{example_harness, example_invocation, HarnessError};
pub use project::{CompilerOptions, Project, SourceText};
pub use session::{LiveSession, Published};
