//! What the evaluator is asked to compile.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use lumen_instrument::InstrumentOptions;

/// One named source text, already read by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceText {
    pub name: String,
    pub text: String,
}

impl SourceText {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        SourceText {
            name: name.into(),
            text: text.into(),
        }
    }
}

/// Compiler flags applied to every source of a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerOptions {
    /// Accept `unsafe { ... }` blocks; integer arithmetic inside them wraps.
    pub allow_unsafe: bool,
    /// Fold constant expressions before execution.
    pub optimize: bool,
    /// Preprocessor symbols defined before the first line of every source.
    pub defines: Vec<String>,
}

/// Ordered sources, library references and compiler flags.
///
/// References are paths to library sources. They are compiled with the
/// project but never instrumented.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub sources: Vec<SourceText>,
    pub references: Vec<PathBuf>,
    pub options: CompilerOptions,
}

impl Project {
    pub fn new(sources: Vec<SourceText>) -> Self {
        Project {
            sources,
            ..Project::default()
        }
    }

    pub fn with_reference(mut self, path: impl Into<PathBuf>) -> Self {
        self.references.push(path.into());
        self
    }

    pub fn with_options(mut self, options: CompilerOptions) -> Self {
        self.options = options;
        self
    }

    /// The same project with `sources` replaced, e.g. by their instrumented
    /// texts.
    pub fn with_sources(&self, sources: Vec<SourceText>) -> Self {
        Project {
            sources,
            references: self.references.clone(),
            options: self.options.clone(),
        }
    }

    pub fn instrument_options(&self) -> InstrumentOptions {
        InstrumentOptions {
            defines: self.options.defines.clone(),
            allow_unsafe: self.options.allow_unsafe,
        }
    }

    /// Reads every reference from its original location.
    pub fn read_references(&self) -> std::io::Result<Vec<SourceText>> {
        self.references
            .iter()
            .map(|path| {
                let text = std::fs::read_to_string(path)?;
                Ok(SourceText::new(path.display().to_string(), text))
            })
            .collect()
    }
}
