//! Lumen execution trace tools.
//!
//! Provides the `lumen` binary. `instrument` prints the rewritten sources,
//! `locate` prints the id to source-location map, `run` evaluates a harness
//! against a project and prints the recorded trace as JSON, and `harness`
//! prints an example invocation of a method.
//!
//! `run` goes through the same live session a long-running host would use,
//! so the CLI and embedders see identical instrumentation and evaluation.
//! Logging goes to stderr, filtered by `LUMEN_LOG` (default `warn`).

use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use lumen_check::Diagnostic;
use lumen_core::id::OperationId;
use lumen_core::parser::ParseOptions;
use lumen_core::span::LineIndex;
use lumen_instrument::{instrument_project, locate_project, LocationKind, LocationMap};
use lumen_sandbox::{
    example_harness, CompileMessage, CompilerOptions, DomainConfig, EvaluationError, Evaluator,
    EvaluatorConfig, HarnessError, LiveSession, Project, RunFailure, SessionError, SourceText,
};
use lumen_trace::{DetectorConfig, SubmissionTracker};

/// Exit code: the project, harness or method was rejected.
const EXIT_REJECTED: i32 = 1;
/// Exit code: the run stopped on a runtime error or a cancellation.
const EXIT_INCOMPLETE: i32 = 2;
/// Exit code: I/O or sandbox failure.
const EXIT_IO: i32 = 3;

/// Execution trace tools for Lumen programs.
#[derive(Parser)]
#[command(name = "lumen", about = "Execution trace tools for Lumen programs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Source files and the options they are checked with.
#[derive(Args, Debug)]
struct SourceArgs {
    /// Source files, in project order.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Library source compiled with the project but never instrumented.
    #[arg(short, long = "reference")]
    references: Vec<PathBuf>,

    /// Preprocessor symbol to define.
    #[arg(short = 'D', long = "define")]
    defines: Vec<String>,

    /// Accept `unsafe` blocks.
    #[arg(long = "unsafe")]
    allow_unsafe: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the instrumented text of every source.
    Instrument {
        #[command(flatten)]
        sources: SourceArgs,
    },

    /// Print the source location of every instrumentation id as JSON.
    Locate {
        #[command(flatten)]
        sources: SourceArgs,
    },

    /// Evaluate a harness against the project and print the trace as JSON.
    Run {
        #[command(flatten)]
        sources: SourceArgs,

        /// Harness statements, e.g. "Sum(3);".
        #[arg(long, required_unless_present = "harness_file", conflicts_with = "harness_file")]
        harness: Option<String>,

        /// File holding the harness statements.
        #[arg(long)]
        harness_file: Option<PathBuf>,

        /// Fold constant expressions before running.
        #[arg(long)]
        optimize: bool,

        /// Equal consecutive values before a loop counts as repeating.
        #[arg(long, default_value_t = 2)]
        repeat_threshold: usize,

        /// Never cancel loops as likely infinite.
        #[arg(long)]
        no_detector: bool,

        /// Executions an isolation domain serves before it is replaced.
        #[arg(long, default_value_t = 25)]
        max_reuses: usize,
    },

    /// Print an example invocation of a method.
    Harness {
        /// Source file declaring the method.
        file: PathBuf,

        /// Method name.
        method: String,

        /// Preprocessor symbol to define.
        #[arg(short = 'D', long = "define")]
        defines: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_env("LUMEN_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let exit_code = match cli.command {
        Commands::Instrument { sources } => run_instrument(&sources),
        Commands::Locate { sources } => run_locate(&sources),
        Commands::Run {
            sources,
            harness,
            harness_file,
            optimize,
            repeat_threshold,
            no_detector,
            max_reuses,
        } => {
            let config = EvaluatorConfig {
                detector: DetectorConfig {
                    repeat_threshold,
                    enabled: !no_detector,
                },
                domain: DomainConfig {
                    max_reuses,
                    ..DomainConfig::default()
                },
                ..EvaluatorConfig::default()
            };
            run_evaluate(&sources, harness, harness_file, optimize, config).await
        }
        Commands::Harness {
            file,
            method,
            defines,
        } => run_harness(&file, &method, defines),
    };
    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// A project read from disk, with every text indexed the way the
/// instrumenter numbers sources.
struct Loaded {
    project: Project,
    references: Vec<SourceText>,
}

impl Loaded {
    fn texts(&self) -> Vec<String> {
        self.project.sources.iter().map(|s| s.text.clone()).collect()
    }

    fn reference_texts(&self) -> Vec<String> {
        self.references.iter().map(|s| s.text.clone()).collect()
    }

    /// Name and text of the source a diagnostic points into.
    fn source(&self, index: usize) -> Option<&SourceText> {
        self.project.sources.iter().chain(&self.references).nth(index)
    }
}

fn read_file(path: &Path) -> Result<String, i32> {
    std::fs::read_to_string(path).map_err(|e| {
        eprintln!("Error: failed to read '{}': {}", path.display(), e);
        EXIT_IO
    })
}

fn load(args: &SourceArgs, optimize: bool) -> Result<Loaded, i32> {
    let mut sources = Vec::with_capacity(args.files.len());
    for path in &args.files {
        sources.push(SourceText::new(path.display().to_string(), read_file(path)?));
    }
    let mut project = Project::new(sources).with_options(CompilerOptions {
        allow_unsafe: args.allow_unsafe,
        optimize,
        defines: args.defines.clone(),
    });
    for path in &args.references {
        project = project.with_reference(path);
    }
    let references = project.read_references().map_err(|e| {
        eprintln!("Error: failed to read reference: {}", e);
        EXIT_IO
    })?;
    Ok(Loaded {
        project,
        references,
    })
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

/// `name(line,col): error L0103: message`
fn format_diagnostic(name: &str, text: &str, diagnostic: &Diagnostic) -> String {
    let at = LineIndex::new(text).line_column(diagnostic.span.start);
    format!("{}({},{}): {}", name, at.line, at.column, diagnostic)
}

fn report_diagnostics(loaded: &Loaded, diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        match loaded.source(diagnostic.source.0 as usize) {
            Some(source) => eprintln!("{}", format_diagnostic(&source.name, &source.text, diagnostic)),
            None => eprintln!("{}", diagnostic),
        }
    }
}

fn format_message(message: &CompileMessage) -> String {
    let severity = if message.is_error { "error" } else { "warning" };
    format!(
        "{}({},{}): {} {}: {}",
        message.source, message.line, message.column, severity, message.code, message.message
    )
}

fn describe_failure(failure: &RunFailure) -> String {
    match failure {
        RunFailure::Runtime(runtime) => format!(
            "runtime error in '{}' at {}({},{}): {}",
            runtime.method, runtime.source, runtime.line, runtime.column, runtime.message
        ),
        RunFailure::Canceled { reason } => format!("execution canceled: {}", reason),
    }
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

/// Execute the instrument subcommand.
///
/// Returns exit code: 0 = success, 1 = rejected, 3 = I/O error.
fn run_instrument(args: &SourceArgs) -> i32 {
    let loaded = match load(args, false) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    let tracker = SubmissionTracker::new();
    let submission = tracker.begin(String::new());
    let instrumented = match instrument_project(
        &loaded.texts(),
        &loaded.reference_texts(),
        &loaded.project.instrument_options(),
        &submission,
    ) {
        Ok(instrumented) => instrumented,
        Err(rejected) => {
            eprintln!("{}", rejected);
            report_diagnostics(&loaded, &rejected.diagnostics);
            return EXIT_REJECTED;
        }
    };
    report_diagnostics(&loaded, &instrumented.warnings);

    let texts = instrumented.texts();
    let several = texts.len() > 1;
    for (source, text) in loaded.project.sources.iter().zip(&texts) {
        if several {
            println!("// {}", source.name);
        }
        print!("{}", text);
    }
    0
}

/// One entry of `lumen locate` output.
#[derive(Debug, Serialize)]
struct LocationEntry<'a> {
    id: OperationId,
    kind: LocationKind,
    source: &'a str,
    line: u32,
    column: u32,
    end_line: u32,
    end_column: u32,
}

fn location_entries<'a>(loaded: &'a Loaded, map: &LocationMap) -> Vec<LocationEntry<'a>> {
    let indices: Vec<LineIndex> = loaded
        .project
        .sources
        .iter()
        .map(|source| LineIndex::new(&source.text))
        .collect();
    map.iter()
        .filter_map(|location| {
            let index = location.source.0 as usize;
            let lines = indices.get(index)?;
            let start = lines.line_column(location.span.start);
            let end = lines.line_column(location.span.end);
            Some(LocationEntry {
                id: location.id,
                kind: location.kind,
                source: &loaded.project.sources[index].name,
                line: start.line,
                column: start.column,
                end_line: end.line,
                end_column: end.column,
            })
        })
        .collect()
}

/// Execute the locate subcommand.
///
/// Returns exit code: 0 = success, 1 = rejected, 3 = I/O error.
fn run_locate(args: &SourceArgs) -> i32 {
    let loaded = match load(args, false) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    let map = match locate_project(
        &loaded.texts(),
        &loaded.reference_texts(),
        &loaded.project.instrument_options(),
    ) {
        Ok(map) => map,
        Err(rejected) => {
            eprintln!("{}", rejected);
            report_diagnostics(&loaded, &rejected.diagnostics);
            return EXIT_REJECTED;
        }
    };
    let entries = location_entries(&loaded, &map);
    match serde_json::to_string_pretty(&entries) {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("Error: failed to serialize locations: {}", e);
            EXIT_IO
        }
    }
}

/// Execute the run subcommand.
///
/// Returns exit code: 0 = the harness ran to completion, 1 = compile
/// errors, 2 = runtime error or cancellation (the partial trace is still
/// printed), 3 = I/O or sandbox error.
async fn run_evaluate(
    args: &SourceArgs,
    harness: Option<String>,
    harness_file: Option<PathBuf>,
    optimize: bool,
    config: EvaluatorConfig,
) -> i32 {
    let loaded = match load(args, optimize) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    let harness = match (harness, harness_file) {
        (Some(text), _) => text,
        (None, Some(path)) => match read_file(&path) {
            Ok(text) => text,
            Err(code) => return code,
        },
        (None, None) => {
            eprintln!("Error: a harness is required");
            return EXIT_REJECTED;
        }
    };

    tracing::debug!(
        sources = loaded.project.sources.len(),
        references = loaded.references.len(),
        "evaluating project"
    );
    let session = LiveSession::new(Evaluator::new(config));
    let published = match session.submit(loaded.project.clone(), harness).await {
        Ok(Some(published)) => published,
        Ok(None) => {
            eprintln!("Error: submission was superseded");
            return EXIT_IO;
        }
        Err(e) => {
            eprintln!("Error: evaluation task failed: {}", e);
            return EXIT_IO;
        }
    };

    match &published.result {
        Ok(evaluation) => {
            match serde_json::to_string_pretty(evaluation) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    eprintln!("Error: failed to serialize trace: {}", e);
                    return EXIT_IO;
                }
            }
            match &evaluation.failure {
                None => 0,
                Some(failure) => {
                    eprintln!("{}", describe_failure(failure));
                    EXIT_INCOMPLETE
                }
            }
        }
        Err(SessionError::Rejected(rejected)) => {
            eprintln!("{}", rejected);
            report_diagnostics(&loaded, &rejected.diagnostics);
            EXIT_REJECTED
        }
        Err(SessionError::Evaluation(EvaluationError::Compile { messages, .. })) => {
            eprintln!("Compilation failed with {} message(s):", messages.len());
            for message in messages {
                eprintln!("  {}", format_message(message));
            }
            EXIT_REJECTED
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            EXIT_IO
        }
    }
}

/// Execute the harness subcommand.
///
/// Returns exit code: 0 = success, 1 = syntax error or unknown method,
/// 3 = I/O error.
fn run_harness(file: &Path, method: &str, defines: Vec<String>) -> i32 {
    let text = match read_file(file) {
        Ok(text) => text,
        Err(code) => return code,
    };
    match example_harness(&text, method, &ParseOptions { defines }) {
        Ok(invocation) => {
            println!("{}", invocation);
            0
        }
        Err(HarnessError::Syntax(e)) => {
            let at = LineIndex::new(&text).line_column(e.span().start);
            eprintln!("{}({},{}): {}", file.display(), at.line, at.column, e);
            EXIT_REJECTED
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            EXIT_REJECTED
        }
    }
}
