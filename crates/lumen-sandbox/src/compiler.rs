//! Compiler front: sources, references and harness into one [`Program`].

use std::fmt;
use std::path::{Path, PathBuf};

use lumen_check::{
    check_program, has_errors, CheckOptions, Diagnostic, EntryBody, Program,
};
use lumen_core::ast::CompilationUnit;
use lumen_core::id::SourceIndex;
use lumen_core::parser::{parse_statements, parse_unit, ParseOptions};
use lumen_core::span::{LineColumn, LineIndex, Span};

use crate::error::{CompileMessage, EvaluationError, SandboxError};
use crate::optimize::fold_program;
use crate::project::{CompilerOptions, SourceText};

/// Name the harness statements are reported under.
pub const HARNESS_SOURCE: &str = "<harness>";

// ---------------------------------------------------------------------------
// Fingerprints
// ---------------------------------------------------------------------------

/// blake3 digest of everything that determines a compiled program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", blake3::Hash::from(self.0).to_hex())
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Everything compiled together for one evaluation.
///
/// Source indices number `sources` first, then `references`, then the
/// harness.
#[derive(Debug, Clone, Copy)]
pub struct CompileInput<'a> {
    pub sources: &'a [SourceText],
    pub references: &'a [SourceText],
    pub harness: &'a str,
    pub options: &'a CompilerOptions,
}

impl<'a> CompileInput<'a> {
    pub fn harness_index(&self) -> SourceIndex {
        SourceIndex((self.sources.len() + self.references.len()) as u32)
    }

    /// Name and text of the source at `index`.
    pub fn text(&self, index: SourceIndex) -> Option<(&'a str, &'a str)> {
        let index = index.0 as usize;
        if index == self.sources.len() + self.references.len() {
            return Some((HARNESS_SOURCE, self.harness));
        }
        self.sources
            .iter()
            .chain(self.references)
            .nth(index)
            .map(|source| (source.name.as_str(), source.text.as_str()))
    }

    /// Source name and 1-based position of `span`.
    pub fn locate(&self, index: SourceIndex, span: Span) -> Option<(&'a str, LineColumn)> {
        self.text(index)
            .map(|(name, text)| (name, LineIndex::new(text).line_column(span.start)))
    }

    pub fn fingerprint(&self) -> Fingerprint {
        let mut hasher = blake3::Hasher::new();
        let mut field = |bytes: &[u8]| {
            hasher.update(&(bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        };
        for source in self.sources.iter().chain(self.references) {
            field(source.name.as_bytes());
            field(source.text.as_bytes());
        }
        field(self.harness.as_bytes());
        field(&[
            self.sources.len() as u8,
            self.options.allow_unsafe as u8,
            self.options.optimize as u8,
        ]);
        for define in &self.options.defines {
            field(define.as_bytes());
        }
        Fingerprint(*hasher.finalize().as_bytes())
    }

    /// Resolves every diagnostic against the text it points into.
    pub fn messages(&self, diagnostics: &[Diagnostic]) -> Vec<CompileMessage> {
        diagnostics
            .iter()
            .map(|diagnostic| {
                let (source, at) = self
                    .locate(diagnostic.source, diagnostic.span)
                    .map(|(name, at)| (name.to_string(), at))
                    .unwrap_or_else(|| {
                        (diagnostic.source.to_string(), LineColumn { line: 1, column: 1 })
                    });
                CompileMessage {
                    source,
                    line: at.line,
                    column: at.column,
                    code: diagnostic.kind.code(),
                    message: diagnostic.kind.to_string(),
                    is_error: diagnostic.is_error(),
                }
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Compilation
// ---------------------------------------------------------------------------

/// A linked program ready to load, with the warnings its check produced.
#[derive(Debug, Clone)]
pub struct Compiled {
    pub program: Program,
    pub warnings: Vec<Diagnostic>,
}

fn rejected(input: &CompileInput<'_>, diagnostics: Vec<Diagnostic>) -> EvaluationError {
    EvaluationError::Compile {
        messages: input.messages(&diagnostics),
        diagnostics,
    }
}

/// Parses and checks every input, then links them with the harness as the
/// entry method. Probe forms are accepted: sources are expected to be
/// instrumented already.
pub fn compile(input: &CompileInput<'_>) -> Result<Compiled, EvaluationError> {
    let parse_options = ParseOptions {
        defines: input.options.defines.clone(),
    };
    let mut units: Vec<(SourceIndex, CompilationUnit)> = Vec::new();
    let mut diagnostics = Vec::new();
    for (index, source) in input.sources.iter().chain(input.references).enumerate() {
        let source_index = SourceIndex(index as u32);
        match parse_unit(&source.text, &parse_options) {
            Ok(unit) => units.push((source_index, unit)),
            Err(error) => diagnostics.push(Diagnostic::syntax(source_index, error)),
        }
    }
    let harness_index = input.harness_index();
    let entry = match parse_statements(input.harness, &parse_options) {
        Ok(stmts) => stmts,
        Err(error) => {
            diagnostics.push(Diagnostic::syntax(harness_index, error));
            Vec::new()
        }
    };
    if !diagnostics.is_empty() {
        return Err(rejected(input, diagnostics));
    }

    let checked: Vec<(SourceIndex, &CompilationUnit)> =
        units.iter().map(|(source, unit)| (*source, unit)).collect();
    let diagnostics = check_program(
        &checked,
        Some(EntryBody {
            source: harness_index,
            stmts: &entry,
        }),
        CheckOptions {
            allow_unsafe: input.options.allow_unsafe,
            allow_probes: true,
        },
    );
    if has_errors(&diagnostics) {
        tracing::debug!(errors = diagnostics.len(), "compilation failed");
        return Err(rejected(input, diagnostics));
    }

    let mut program = Program::link(&units);
    program.add_entry(harness_index, entry);
    if input.options.optimize {
        fold_program(&mut program);
    }
    tracing::debug!(
        methods = program.methods.len(),
        statics = program.statics.len(),
        optimize = input.options.optimize,
        "compiled program"
    );
    Ok(Compiled {
        program,
        warnings: diagnostics,
    })
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

/// Where the artifact for `fingerprint` lives inside `dir`.
pub fn artifact_path(dir: &Path, fingerprint: &Fingerprint) -> PathBuf {
    dir.join(format!("{fingerprint}.json"))
}

pub fn write_artifact(path: &Path, program: &Program) -> Result<(), SandboxError> {
    let json = serde_json::to_vec(program)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn read_artifact(path: &Path) -> Result<Program, SandboxError> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_check::ENTRY_POINT;

    fn sources(texts: &[&str]) -> Vec<SourceText> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| SourceText::new(format!("s{i}.lm"), *text))
            .collect()
    }

    #[test]
    fn harness_becomes_the_entry_method() {
        let sources = sources(&["int Twice(int a) { return a * 2; }"]);
        let options = CompilerOptions::default();
        let input = CompileInput {
            sources: &sources,
            references: &[],
            harness: "print(Twice(4));",
            options: &options,
        };
        let compiled = compile(&input).unwrap();
        let entry = compiled.program.method(ENTRY_POINT).unwrap();
        assert_eq!(entry.source, SourceIndex(1));
        assert!(compiled.program.method("Twice").is_some());
    }

    #[test]
    fn harness_errors_are_reported_against_the_harness() {
        let sources = sources(&["void F() { }"]);
        let options = CompilerOptions::default();
        let input = CompileInput {
            sources: &sources,
            references: &[],
            harness: "F();\nG();",
            options: &options,
        };
        let Err(EvaluationError::Compile { messages, .. }) = compile(&input) else {
            panic!("expected a compile error");
        };
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].source, HARNESS_SOURCE);
        assert_eq!((messages[0].line, messages[0].column), (2, 1));
        assert_eq!(messages[0].code, "L0104");
    }

    #[test]
    fn fingerprint_covers_options_and_harness() {
        let sources = sources(&["void F() { }"]);
        let plain = CompilerOptions::default();
        let optimized = CompilerOptions {
            optimize: true,
            ..CompilerOptions::default()
        };
        fn fingerprint_of(sources: &[SourceText], harness: &str, options: &CompilerOptions) -> Fingerprint {
            CompileInput {
                sources,
                references: &[],
                harness,
                options,
            }
            .fingerprint()
        }
        let a = fingerprint_of(&sources, "F();", &plain);
        assert_eq!(a, fingerprint_of(&sources, "F();", &plain));
        assert_ne!(a, fingerprint_of(&sources, "F(); F();", &plain));
        assert_ne!(a, fingerprint_of(&sources, "F();", &optimized));
        assert_eq!(a.to_string().len(), 64);
    }

    #[test]
    fn artifacts_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let sources = sources(&["int F() { return 3; }"]);
        let options = CompilerOptions::default();
        let input = CompileInput {
            sources: &sources,
            references: &[],
            harness: "F();",
            options: &options,
        };
        let compiled = compile(&input).unwrap();
        let path = artifact_path(dir.path(), &input.fingerprint());
        write_artifact(&path, &compiled.program).unwrap();
        assert_eq!(read_artifact(&path).unwrap(), compiled.program);
    }
}
