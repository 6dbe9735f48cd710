//! Per-function-call verdict accumulation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use vigil_formula::{Observation, Verdict};

/// Evidence maps keyed by atom index, then sub-index.
pub type ObservationMap = HashMap<usize, HashMap<usize, Observation>>;
pub type ProgramPathMap = HashMap<usize, HashMap<usize, usize>>;
pub type StateDictMap = HashMap<usize, HashMap<usize, Option<serde_json::Value>>>;

/// One collapsed monitor's verdict together with its evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerdictEntry {
    pub verdict: Verdict,
    /// When the verdict was registered into the report.
    pub time: DateTime<Utc>,
    pub atom_to_observation: ObservationMap,
    pub atom_to_program_path: ProgramPathMap,
    pub collapsing_atom_index: usize,
    pub collapsing_atom_sub_index: usize,
    pub atom_to_state_dict: StateDictMap,
}

/// Accumulator mapping static binding-space indices to the verdicts their
/// monitors reached during one function call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerdictReport {
    verdicts: HashMap<usize, Vec<VerdictEntry>>,
}

impl VerdictReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_verdict(&mut self, static_qd_index: usize, entry: VerdictEntry) {
        self.verdicts.entry(static_qd_index).or_default().push(entry);
    }

    /// Drop everything accumulated for the finished call.
    pub fn reset(&mut self) {
        self.verdicts.clear();
    }

    pub fn final_verdicts(&self) -> &HashMap<usize, Vec<VerdictEntry>> {
        &self.verdicts
    }

    pub fn is_empty(&self) -> bool {
        self.verdicts.is_empty()
    }
}
