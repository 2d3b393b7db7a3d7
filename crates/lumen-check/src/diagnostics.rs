//! Compile diagnostics.
//!
//! Any [`Severity::Error`] diagnostic blocks instrumentation and execution.
//! Warnings are reported alongside but never block.

use std::fmt;

use serde::{Deserialize, Serialize};

use lumen_core::id::SourceIndex;
use lumen_core::span::{LineIndex, Span};
use lumen_core::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
}

/// What a diagnostic is about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum DiagnosticKind {
    #[error("syntax error: {0}")]
    Syntax(#[from] ParseError),

    #[error("method '{name}' is already defined")]
    DuplicateMethod { name: String },

    #[error("a variable named '{name}' is already defined in this scope")]
    DuplicateVariable { name: String },

    #[error("the name '{name}' does not exist in the current context")]
    UndefinedVariable { name: String },

    #[error("the method '{name}' does not exist in the current context")]
    UndefinedMethod { name: String },

    #[error("method '{name}' takes {expected} arguments but {found} were given")]
    ArgumentCount {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("no enclosing loop out of which to break")]
    BreakOutsideLoop,

    #[error("no enclosing loop to continue")]
    ContinueOutsideLoop,

    #[error("method '{name}' returns void; a return keyword must not be followed by an expression")]
    ReturnValueFromVoid { name: String },

    #[error("method '{name}' must return a value")]
    MissingReturnValue { name: String },

    #[error("not all code paths return a value in method '{name}'")]
    NotAllPathsReturn { name: String },

    #[error("unsafe code may only appear if compiling with unsafe enabled")]
    UnsafeNotAllowed,

    #[error("identifiers starting with '__' are reserved: '{name}'")]
    ReservedName { name: String },

    #[error("only assignment, call, increment and decrement expressions can be used as a statement")]
    InvalidStatement,

    #[error("implicitly typed variable '{name}' must be initialized")]
    ImplicitlyTypedWithoutInit { name: String },

    #[error("variable '{name}' cannot have type void")]
    VoidVariable { name: String },

    #[error("'{name}' is a builtin and cannot be redefined")]
    BuiltinRedefined { name: String },

    #[error("spawn target must be a user-defined method")]
    SpawnTarget,

    #[error("probe forms are only allowed in instrumented programs")]
    ProbeNotAllowed,

    #[error("unreachable code detected")]
    UnreachableCode,
}

impl DiagnosticKind {
    /// Stable short code, e.g. `L0103`.
    pub fn code(&self) -> &'static str {
        match self {
            DiagnosticKind::Syntax(_) => "L0001",
            DiagnosticKind::DuplicateMethod { .. } => "L0101",
            DiagnosticKind::DuplicateVariable { .. } => "L0102",
            DiagnosticKind::UndefinedVariable { .. } => "L0103",
            DiagnosticKind::UndefinedMethod { .. } => "L0104",
            DiagnosticKind::ArgumentCount { .. } => "L0105",
            DiagnosticKind::BreakOutsideLoop => "L0106",
            DiagnosticKind::ContinueOutsideLoop => "L0107",
            DiagnosticKind::ReturnValueFromVoid { .. } => "L0108",
            DiagnosticKind::MissingReturnValue { .. } => "L0109",
            DiagnosticKind::NotAllPathsReturn { .. } => "L0110",
            DiagnosticKind::UnsafeNotAllowed => "L0111",
            DiagnosticKind::ReservedName { .. } => "L0112",
            DiagnosticKind::InvalidStatement => "L0113",
            DiagnosticKind::ImplicitlyTypedWithoutInit { .. } => "L0114",
            DiagnosticKind::VoidVariable { .. } => "L0115",
            DiagnosticKind::BuiltinRedefined { .. } => "L0116",
            DiagnosticKind::SpawnTarget => "L0117",
            DiagnosticKind::ProbeNotAllowed => "L0118",
            DiagnosticKind::UnreachableCode => "L0201",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            DiagnosticKind::UnreachableCode => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// A diagnostic anchored to a span of one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub source: SourceIndex,
    pub span: Span,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn new(source: SourceIndex, span: Span, kind: DiagnosticKind) -> Self {
        Diagnostic {
            severity: kind.severity(),
            source,
            span,
            kind,
        }
    }

    pub fn syntax(source: SourceIndex, error: ParseError) -> Self {
        Diagnostic::new(source, error.span(), DiagnosticKind::Syntax(error))
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// `source(line,col): error L0103: message`, resolved against `text`.
    pub fn render(&self, text: &str) -> String {
        let at = LineIndex::new(text).line_column(self.span.start);
        format!("{}({},{}): {self}", self.source, at.line, at.column)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{severity} {}: {}", self.kind.code(), self.kind)
    }
}

/// Whether any diagnostic in `diagnostics` blocks compilation.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}
