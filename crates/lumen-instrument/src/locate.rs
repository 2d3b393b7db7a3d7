//! The id to source-location map.
//!
//! Built by the same traversal that assigns ids during rewriting, so an id
//! always points at the construct that produced it. Consumers use it to
//! place trace values next to the source they came from.

use serde::{Deserialize, Serialize};

use lumen_core::id::{OperationId, SourceIndex};
use lumen_core::span::Span;

/// What kind of construct an id was assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocationKind {
    /// A method prologue; the span is the method name.
    Method,
    /// One parameter captured on entry.
    Argument,
    /// The exit of a method that returns no value; the span is the closing
    /// brace of its body.
    Exit,
    /// A declarator initializer or an assignment to a variable.
    Assignment,
    /// `++`/`--` applied to a variable.
    Increment,
    /// `return <expr>`.
    Return,
    /// A loop statement.
    Loop,
    /// One pass of a loop; the span is the loop body.
    Iteration,
    /// The variable of a `foreach` loop.
    LoopItem,
}

/// Where one id came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: OperationId,
    pub source: SourceIndex,
    pub span: Span,
    pub kind: LocationKind,
}

/// Locations of every id assigned in one instrumentation pass, in id order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationMap {
    locations: Vec<Location>,
}

impl LocationMap {
    pub(crate) fn push(&mut self, location: Location) {
        self.locations.push(location);
    }

    /// The location `id` was assigned to.
    pub fn get(&self, id: OperationId) -> Option<&Location> {
        self.locations
            .binary_search_by_key(&id, |location| location.id)
            .ok()
            .map(|index| &self.locations[index])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Location> {
        self.locations.iter()
    }

    /// Locations within one source text.
    pub fn in_source(&self, source: SourceIndex) -> impl Iterator<Item = &Location> {
        self.locations
            .iter()
            .filter(move |location| location.source == source)
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }
}
