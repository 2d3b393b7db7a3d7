//! Heuristic infinite-loop detection.
//!
//! After each completed iteration the detector asks whether the loop is
//! stagnant: nothing it can observe has changed across the last few
//! iterations. This bounds wasted execution time. It is not a termination
//! proof; loops whose only progress is in untracked state can be flagged.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use lumen_core::operation::{HistoryEntry, Loop, LoopIteration, Operation};

/// Tuning for [`LoopDetector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// How many consecutive equal values a variable needs before the loop
    /// counts as repeating. Values below 2 are treated as 2.
    pub repeat_threshold: usize,
    /// Turns detection off entirely.
    pub enabled: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        DetectorConfig {
            repeat_threshold: 2,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoopDetector {
    config: DetectorConfig,
}

impl LoopDetector {
    pub fn new(config: DetectorConfig) -> Self {
        LoopDetector { config }
    }

    pub fn config(&self) -> DetectorConfig {
        self.config
    }

    fn threshold(&self) -> usize {
        self.config.repeat_threshold.max(2)
    }

    /// Verdict for a loop still being recorded, using the recorder's
    /// index-aligned per-variable histories.
    pub fn is_likely_infinite(
        &self,
        lp: &Loop,
        histories: &IndexMap<String, Vec<HistoryEntry>>,
    ) -> bool {
        if !self.config.enabled {
            return false;
        }
        let k = self.threshold();
        self.stagnant(lp, &mut |name: &str| {
            histories.get(name).map_or_else(Vec::new, |history| {
                history
                    .iter()
                    .rev()
                    .filter_map(HistoryEntry::value)
                    .take(k)
                    .map(str::to_owned)
                    .collect()
            })
        })
    }

    /// Verdict for a finished loop, deriving histories from its iterations.
    pub fn is_stagnant(&self, lp: &Loop) -> bool {
        let k = self.threshold();
        self.stagnant(lp, &mut |name: &str| recent_values(lp, name, k))
    }

    fn stagnant(&self, lp: &Loop, recent: &mut dyn FnMut(&str) -> Vec<String>) -> bool {
        let k = self.threshold();
        if lp.iterations.len() < k {
            return false;
        }
        let Some(last) = lp.iterations.last() else {
            return false;
        };

        let mut repeated = false;
        for op in &last.operations {
            match op {
                // Calls and returns are forward progress regardless of state.
                Operation::MethodCall(_) | Operation::ReturnValue(_) => return false,
                Operation::Loop(nested) => {
                    if !self.is_stagnant(nested) {
                        return false;
                    }
                }
                Operation::StateChange(change) => {
                    let values = recent(&change.variable);
                    if values.windows(2).any(|pair| pair[0] != pair[1]) {
                        return false;
                    }
                    if values.len() >= k {
                        repeated = true;
                    }
                }
            }
        }
        repeated
    }
}

/// Last write to `name` directly inside `iteration`.
fn last_write<'a>(iteration: &'a LoopIteration, name: &str) -> Option<&'a str> {
    iteration
        .state_changes()
        .filter(|change| change.variable == name)
        .last()
        .map(|change| change.value.as_str())
}

/// Up to `count` most recent per-iteration values of `name`, newest first.
fn recent_values(lp: &Loop, name: &str, count: usize) -> Vec<String> {
    lp.iterations
        .iter()
        .rev()
        .filter_map(|iteration| last_write(iteration, name))
        .take(count)
        .map(str::to_owned)
        .collect()
}
