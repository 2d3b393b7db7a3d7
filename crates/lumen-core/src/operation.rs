//! The Operation Model: records produced by an instrumented run.
//!
//! A trace is a tree. [`MethodCall`], [`Loop`] and [`LoopIteration`] are
//! containers; [`StateChange`] and [`ReturnValue`] are leaves. A [`Loop`]
//! holds only [`LoopIteration`]s, which the types enforce directly. Nodes
//! are appended once and never mutated afterwards.

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::id::OperationId;

/// One recorded runtime event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    MethodCall(MethodCall),
    Loop(Loop),
    StateChange(StateChange),
    ReturnValue(ReturnValue),
}

impl Operation {
    /// The id of the source construct that produced this record.
    pub fn id(&self) -> OperationId {
        match self {
            Operation::MethodCall(call) => call.id,
            Operation::Loop(lp) => lp.id,
            Operation::StateChange(change) => change.id,
            Operation::ReturnValue(ret) => ret.id,
        }
    }

    /// Visits this operation and every descendant in pre-order.
    ///
    /// Loop iterations are not operations of their own; their children are
    /// visited in iteration order.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Operation)) {
        visit(self);
        match self {
            Operation::MethodCall(call) => {
                for op in &call.operations {
                    op.walk(visit);
                }
            }
            Operation::Loop(lp) => {
                for iteration in &lp.iterations {
                    for op in &iteration.operations {
                        op.walk(visit);
                    }
                }
            }
            Operation::StateChange(_) | Operation::ReturnValue(_) => {}
        }
    }
}

/// Argument snapshots rarely exceed a handful of parameters.
pub type Arguments = SmallVec<[StateChange; 4]>;

/// One invocation of a method and the trace of its body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub id: OperationId,
    pub name: String,
    /// Parameter values captured on entry, in declaration order.
    pub arguments: Arguments,
    pub operations: Vec<Operation>,
}

impl MethodCall {
    pub fn new(id: OperationId, name: impl Into<String>, arguments: Arguments) -> Self {
        MethodCall {
            id,
            name: name.into(),
            arguments,
            operations: Vec::new(),
        }
    }

    /// The recorded return value, if the body produced one directly.
    pub fn return_value(&self) -> Option<&ReturnValue> {
        self.operations.iter().rev().find_map(|op| match op {
            Operation::ReturnValue(ret) => Some(ret),
            _ => None,
        })
    }

    /// Loops recorded directly in this method's body.
    pub fn loops(&self) -> impl Iterator<Item = &Loop> {
        self.operations.iter().filter_map(|op| match op {
            Operation::Loop(lp) => Some(lp),
            _ => None,
        })
    }
}

/// One execution of a loop statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loop {
    pub id: OperationId,
    pub iterations: Vec<LoopIteration>,
}

impl Loop {
    pub fn new(id: OperationId) -> Self {
        Loop {
            id,
            iterations: Vec::new(),
        }
    }

    /// Per-iteration values of `variable`, one entry per iteration.
    ///
    /// The entry is the last value written directly in that iteration, or
    /// [`HistoryEntry::Skipped`] if the iteration never wrote it. Writes made
    /// inside nested loops or called methods belong to those containers.
    pub fn history(&self, variable: &str) -> Vec<HistoryEntry> {
        self.iterations
            .iter()
            .map(|iteration| {
                iteration
                    .state_changes()
                    .filter(|change| change.variable == variable)
                    .last()
                    .map_or(HistoryEntry::Skipped, |change| {
                        HistoryEntry::Value(change.value.clone())
                    })
            })
            .collect()
    }
}

/// One pass through a loop body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopIteration {
    pub id: OperationId,
    pub operations: Vec<Operation>,
}

impl LoopIteration {
    pub fn new(id: OperationId) -> Self {
        LoopIteration {
            id,
            operations: Vec::new(),
        }
    }

    /// State changes recorded directly in this iteration.
    pub fn state_changes(&self) -> impl Iterator<Item = &StateChange> {
        self.operations.iter().filter_map(|op| match op {
            Operation::StateChange(change) => Some(change),
            _ => None,
        })
    }
}

/// A variable taking a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub id: OperationId,
    pub variable: String,
    /// Display-formatted value.
    pub value: String,
}

/// The value a method returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnValue {
    pub id: OperationId,
    /// Display-formatted value; `None` for a method that returns nothing.
    pub value: Option<String>,
}

/// One slot of a variable's per-iteration history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HistoryEntry {
    Value(String),
    /// The iteration never wrote the variable.
    Skipped,
}

impl HistoryEntry {
    pub fn value(&self) -> Option<&str> {
        match self {
            HistoryEntry::Value(value) => Some(value),
            HistoryEntry::Skipped => None,
        }
    }
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value().unwrap_or(""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn change(id: u32, variable: &str, value: &str) -> Operation {
        Operation::StateChange(StateChange {
            id: OperationId(id),
            variable: variable.into(),
            value: value.into(),
        })
    }

    fn iteration(ops: Vec<Operation>) -> LoopIteration {
        LoopIteration {
            id: OperationId(2),
            operations: ops,
        }
    }

    #[test]
    fn history_marks_skipped_iterations() {
        let lp = Loop {
            id: OperationId(1),
            iterations: vec![
                iteration(vec![change(3, "x", "1")]),
                iteration(vec![change(4, "y", "9")]),
                iteration(vec![change(3, "x", "2"), change(3, "x", "3")]),
            ],
        };
        assert_eq!(
            lp.history("x"),
            vec![
                HistoryEntry::Value("1".into()),
                HistoryEntry::Skipped,
                HistoryEntry::Value("3".into()),
            ]
        );
        assert_eq!(lp.history("z"), vec![HistoryEntry::Skipped; 3]);
    }

    #[test]
    fn history_ignores_nested_loops() {
        let inner = Loop {
            id: OperationId(5),
            iterations: vec![iteration(vec![change(6, "x", "7")])],
        };
        let outer = Loop {
            id: OperationId(1),
            iterations: vec![iteration(vec![Operation::Loop(inner)])],
        };
        assert_eq!(outer.history("x"), vec![HistoryEntry::Skipped]);
    }

    #[test]
    fn skipped_displays_empty() {
        assert_eq!(HistoryEntry::Skipped.to_string(), "");
        assert_eq!(HistoryEntry::Value("4".into()).to_string(), "4");
    }

    #[test]
    fn walk_visits_pre_order() {
        let mut call = MethodCall::new(
            OperationId(0),
            "F",
            smallvec![StateChange {
                id: OperationId(1),
                variable: "n".into(),
                value: "2".into(),
            }],
        );
        call.operations.push(Operation::Loop(Loop {
            id: OperationId(2),
            iterations: vec![iteration(vec![change(3, "t", "1")])],
        }));
        call.operations.push(Operation::ReturnValue(ReturnValue {
            id: OperationId(4),
            value: Some("1".into()),
        }));
        let root = Operation::MethodCall(call);

        let mut ids = Vec::new();
        root.walk(&mut |op| ids.push(op.id().0));
        assert_eq!(ids, vec![0, 2, 3, 4]);

        match &root {
            Operation::MethodCall(call) => {
                assert_eq!(call.return_value().and_then(|r| r.value.as_deref()), Some("1"));
                assert_eq!(call.loops().count(), 1);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn serializes_to_json() {
        let op = change(3, "x", "\"hi\"");
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["StateChange"]["variable"], "x");
        let back: Operation = serde_json::from_value(json).unwrap();
        assert_eq!(back, op);
    }
}
