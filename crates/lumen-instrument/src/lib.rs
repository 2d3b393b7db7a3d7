//! Instrumentation of Lumen projects.
//!
//! [`instrument_project`] parses and checks a project, then rewrites every
//! method so that running it reports to a trace recorder. A project with any
//! compile error is [`Rejected`] as a whole; nothing is rewritten.
//!
//! # Modules
//!
//! - [`fixup`] -- Block coercion of branches and loop bodies
//! - [`rewriter`] -- Probe injection and id assignment
//! - [`locate`] -- The id to source-location map

pub mod fixup;
pub mod locate;
pub mod rewriter;

pub use locate::{Location, LocationKind, LocationMap};
pub use rewriter::{IdSource, Rewriter, Sequential};

use serde::{Deserialize, Serialize};

use lumen_check::{check_program, has_errors, CheckOptions, Diagnostic};
use lumen_core::ast::CompilationUnit;
use lumen_core::id::{SourceIndex, SubmissionId};
use lumen_core::parser::{parse_unit, ParseOptions};
use lumen_core::printer::print_unit;
use lumen_trace::Submission;

/// Options shared by checking and instrumentation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentOptions {
    /// Preprocessor symbols defined for every source.
    pub defines: Vec<String>,
    /// Accept `unsafe { ... }` blocks.
    pub allow_unsafe: bool,
}

impl InstrumentOptions {
    fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            defines: self.defines.clone(),
        }
    }
}

/// The project did not compile; carries every diagnostic found.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("project rejected with {} error(s)", error_count(.diagnostics))]
pub struct Rejected {
    pub diagnostics: Vec<Diagnostic>,
}

fn error_count(diagnostics: &[Diagnostic]) -> usize {
    diagnostics.iter().filter(|d| d.is_error()).count()
}

/// Instrumented sources of one submission.
#[derive(Debug, Clone)]
pub struct InstrumentedProject {
    pub submission: SubmissionId,
    /// One unit per input source, in input order.
    pub units: Vec<CompilationUnit>,
    pub locations: LocationMap,
    /// Non-blocking diagnostics from the check.
    pub warnings: Vec<Diagnostic>,
}

impl InstrumentedProject {
    /// The instrumented units rendered back to source text.
    pub fn texts(&self) -> Vec<String> {
        self.units.iter().map(print_unit).collect()
    }
}

/// Parses `sources` and `references` and checks them together.
///
/// Source indices number `sources` first, then `references`. Only the
/// units of `sources` are returned; references are never instrumented.
fn prepare(
    sources: &[String],
    references: &[String],
    options: &InstrumentOptions,
) -> Result<(Vec<CompilationUnit>, Vec<Diagnostic>), Rejected> {
    let parse_options = options.parse_options();
    let mut units = Vec::with_capacity(sources.len() + references.len());
    let mut diagnostics = Vec::new();
    for (index, text) in sources.iter().chain(references).enumerate() {
        let source = SourceIndex(index as u32);
        match parse_unit(text, &parse_options) {
            Ok(unit) => units.push((source, unit)),
            Err(error) => diagnostics.push(Diagnostic::syntax(source, error)),
        }
    }
    if !diagnostics.is_empty() {
        return Err(Rejected { diagnostics });
    }

    let checked: Vec<(SourceIndex, &CompilationUnit)> =
        units.iter().map(|(source, unit)| (*source, unit)).collect();
    let diagnostics = check_program(
        &checked,
        None,
        CheckOptions {
            allow_unsafe: options.allow_unsafe,
            allow_probes: false,
        },
    );
    if has_errors(&diagnostics) {
        return Err(Rejected { diagnostics });
    }

    units.truncate(sources.len());
    Ok((units.into_iter().map(|(_, unit)| unit).collect(), diagnostics))
}

/// Instruments every source of a project for `submission`.
///
/// Ids come from the submission's counter, so a fresh submission numbers
/// identical input identically.
pub fn instrument_project(
    sources: &[String],
    references: &[String],
    options: &InstrumentOptions,
    submission: &Submission,
) -> Result<InstrumentedProject, Rejected> {
    let (units, warnings) = prepare(sources, references, options).map_err(|rejected| {
        tracing::debug!(submission = %submission.id(), %rejected, "instrumentation rejected");
        rejected
    })?;

    let mut rewriter = Rewriter::new(submission.id(), submission);
    let units: Vec<CompilationUnit> = units
        .iter()
        .enumerate()
        .map(|(index, unit)| rewriter.rewrite_unit(SourceIndex(index as u32), unit))
        .collect();
    let locations = rewriter.finish();
    tracing::debug!(
        submission = %submission.id(),
        sources = units.len(),
        operations = locations.len(),
        "project instrumented"
    );
    Ok(InstrumentedProject {
        submission: submission.id(),
        units,
        locations,
        warnings,
    })
}

/// Builds the location map [`instrument_project`] would produce with a
/// fresh submission, without rewriting anything for execution.
pub fn locate_project(
    sources: &[String],
    references: &[String],
    options: &InstrumentOptions,
) -> Result<LocationMap, Rejected> {
    let (units, _) = prepare(sources, references, options)?;
    let mut rewriter = Rewriter::new(SubmissionId(0), Sequential::default());
    for (index, unit) in units.iter().enumerate() {
        rewriter.rewrite_unit(SourceIndex(index as u32), unit);
    }
    Ok(rewriter.finish())
}
