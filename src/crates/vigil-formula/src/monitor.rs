//! Per-binding formula monitors.
//!
//! A monitor holds one formula instance, the truth state of each atom, and
//! the evidence (observations, program-path lengths, state snapshots) keyed
//! by atom index and sub-index. Observations are processed at most once per
//! (atom, sub-index); the first update that determines the formula records
//! the collapsing atom.

use crate::formula::{AtomRef, Formula, Verdict};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One recorded observation at an instrumentation point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub value: serde_json::Value,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub inst_point_id: i64,
}

/// A stateful evaluator of one property formula instance against one
/// quantifier binding (or a prefix of one, while later bind variables are
/// still being triggered).
#[derive(Debug, Clone)]
pub struct FormulaMonitor {
    formula: Formula,
    /// Per-atom tri-state: unknown, true, or false.
    state: Vec<Option<bool>>,
    verdict: Verdict,
    /// One timestamp per bind variable this monitor has been instantiated
    /// for, in binding order.
    pub monitor_instantiation_time: Vec<DateTime<Utc>>,
    /// atom index, then sub-index.
    pub atom_to_observation: HashMap<usize, HashMap<usize, Observation>>,
    /// Length of the program path at observation time.
    pub atom_to_program_path: HashMap<usize, HashMap<usize, usize>>,
    /// Optional state snapshot attached to transition-style measurements.
    pub atom_to_state_dict: HashMap<usize, HashMap<usize, Option<serde_json::Value>>>,
    /// The atom whose truth value determined the verdict, if any.
    pub collapsing_atom_index: Option<usize>,
    pub collapsing_atom_sub_index: Option<usize>,
}

/// Instantiate a fresh monitor for a formula.
pub fn new_monitor(formula: &Formula) -> FormulaMonitor {
    FormulaMonitor {
        state: vec![None; formula.atoms.len()],
        formula: formula.clone(),
        verdict: Verdict::Inconclusive,
        monitor_instantiation_time: vec![Utc::now()],
        atom_to_observation: HashMap::new(),
        atom_to_program_path: HashMap::new(),
        atom_to_state_dict: HashMap::new(),
        collapsing_atom_index: None,
        collapsing_atom_sub_index: None,
    }
}

impl FormulaMonitor {
    pub fn formula(&self) -> &Formula {
        &self.formula
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    /// Tri-state truth per atom index.
    pub fn atom_state(&self) -> &[Option<bool>] {
        &self.state
    }

    /// Record a truth value directly, as replayed during monitor cloning.
    /// A negated reference records the atom as false.
    pub fn check_optimised(&mut self, atom: AtomRef) {
        self.apply_truth(atom.atom_index, !atom.negated, 0);
    }

    /// Re-evaluate a (typically mixed) atom from its stored observations.
    /// A mixed atom only resolves once both sub-index slots are present;
    /// until then this is a no-op.
    pub fn check_atom_truth_value(&mut self, atom_index: usize, sub_index: usize) {
        let atom = self.formula.atom(atom_index).clone();
        if atom.is_mixed() {
            let slots = match self.atom_to_observation.get(&atom_index) {
                Some(slots) => slots,
                None => return,
            };
            let (first, second) = match (slots.get(&0), slots.get(&1)) {
                (Some(first), Some(second)) => (first.value.clone(), second.value.clone()),
                _ => return,
            };
            let truth = atom.predicate.holds_pair(&first, &second);
            self.apply_truth(atom_index, truth, sub_index);
        } else {
            let truth = match self
                .atom_to_observation
                .get(&atom_index)
                .and_then(|slots| slots.get(&sub_index))
            {
                Some(observation) => atom.predicate.holds(&observation.value),
                None => return,
            };
            self.apply_truth(atom_index, truth, sub_index);
        }
    }

    /// Consume one observation from an instrumentation point.
    ///
    /// Returns false when the (atom, sub-index) slot was already processed;
    /// monitors never observe the same slot twice.
    #[allow(clippy::too_many_arguments)]
    pub fn process_atom_and_value(
        &mut self,
        atom_index: usize,
        sub_index: usize,
        observation_start: DateTime<Utc>,
        observation_end: DateTime<Utc>,
        value: serde_json::Value,
        inst_point_id: i64,
        program_path_length: usize,
        state_dict: Option<serde_json::Value>,
    ) -> bool {
        if self
            .atom_to_observation
            .get(&atom_index)
            .map(|slots| slots.contains_key(&sub_index))
            .unwrap_or(false)
        {
            return false;
        }

        self.atom_to_observation
            .entry(atom_index)
            .or_default()
            .insert(
                sub_index,
                Observation {
                    value,
                    start: observation_start,
                    end: observation_end,
                    inst_point_id,
                },
            );
        self.atom_to_program_path
            .entry(atom_index)
            .or_default()
            .insert(sub_index, program_path_length);
        self.atom_to_state_dict
            .entry(atom_index)
            .or_default()
            .insert(sub_index, state_dict);

        self.check_atom_truth_value(atom_index, sub_index);
        true
    }

    /// Copy one evidence slot from another monitor, used when a trigger for
    /// a later bind variable clones the prefix of an existing monitor.
    pub fn copy_slot(&mut self, source: &FormulaMonitor, atom_index: usize, sub_index: usize) {
        if let Some(observation) = source
            .atom_to_observation
            .get(&atom_index)
            .and_then(|slots| slots.get(&sub_index))
        {
            self.atom_to_observation
                .entry(atom_index)
                .or_default()
                .insert(sub_index, observation.clone());
        }
        if let Some(path) = source
            .atom_to_program_path
            .get(&atom_index)
            .and_then(|slots| slots.get(&sub_index))
        {
            self.atom_to_program_path
                .entry(atom_index)
                .or_default()
                .insert(sub_index, *path);
        }
        if let Some(state) = source
            .atom_to_state_dict
            .get(&atom_index)
            .and_then(|slots| slots.get(&sub_index))
        {
            self.atom_to_state_dict
                .entry(atom_index)
                .or_default()
                .insert(sub_index, state.clone());
        }
    }

    fn apply_truth(&mut self, atom_index: usize, truth: bool, sub_index: usize) {
        if self.state[atom_index].is_some() {
            return;
        }
        self.state[atom_index] = Some(truth);

        if self.verdict == Verdict::Inconclusive {
            self.verdict = self.formula.tree.evaluate(&self.state);
            if self.verdict != Verdict::Inconclusive && self.collapsing_atom_index.is_none() {
                self.collapsing_atom_index = Some(atom_index);
                self.collapsing_atom_sub_index = Some(sub_index);
            }
        }
    }

    /// True while no verdict has been reached.
    pub fn is_inconclusive(&self) -> bool {
        self.verdict == Verdict::Inconclusive
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::{lnot, Atom, Predicate};
    use serde_json::json;

    fn simple_formula() -> Formula {
        Formula::conjunction(
            vec!["q".to_string()],
            vec![Atom::single(0, 0, Predicate::LessThan(2.0))],
        )
    }

    #[test]
    fn test_observation_collapses_verdict() {
        let formula = simple_formula();
        let mut monitor = new_monitor(&formula);
        assert_eq!(monitor.verdict(), Verdict::Inconclusive);

        let now = Utc::now();
        let accepted =
            monitor.process_atom_and_value(0, 0, now, now, json!(1.0), 7, 0, None);
        assert!(accepted);
        assert_eq!(monitor.verdict(), Verdict::True);
        assert_eq!(monitor.collapsing_atom_index, Some(0));
        assert_eq!(monitor.collapsing_atom_sub_index, Some(0));
    }

    #[test]
    fn test_duplicate_observation_rejected() {
        let formula = simple_formula();
        let mut monitor = new_monitor(&formula);
        let now = Utc::now();
        assert!(monitor.process_atom_and_value(0, 0, now, now, json!(1.0), 7, 0, None));
        assert!(!monitor.process_atom_and_value(0, 0, now, now, json!(99.0), 7, 1, None));
        // the first observation stands
        assert_eq!(monitor.verdict(), Verdict::True);
    }

    #[test]
    fn test_check_optimised_replays_truth() {
        let formula = simple_formula();
        let mut monitor = new_monitor(&formula);
        monitor.check_optimised(AtomRef::positive(0));
        assert_eq!(monitor.verdict(), Verdict::True);

        let mut negative = new_monitor(&formula);
        negative.check_optimised(lnot(AtomRef::positive(0)));
        assert_eq!(negative.verdict(), Verdict::False);
    }

    #[test]
    fn test_mixed_atom_waits_for_both_slots() {
        let formula = Formula::conjunction(
            vec!["q1".to_string(), "q2".to_string()],
            vec![Atom::mixed(0, vec![0, 1], Predicate::DiffLessThan(1.0))],
        );
        let mut monitor = new_monitor(&formula);
        let now = Utc::now();

        monitor.process_atom_and_value(0, 0, now, now, json!(5.0), 1, 0, None);
        assert_eq!(monitor.verdict(), Verdict::Inconclusive);

        monitor.process_atom_and_value(0, 1, now, now, json!(5.5), 2, 1, None);
        assert_eq!(monitor.verdict(), Verdict::True);
        assert_eq!(monitor.collapsing_atom_sub_index, Some(1));
    }

    #[test]
    fn test_copy_slot_transfers_evidence() {
        let formula = simple_formula();
        let mut source = new_monitor(&formula);
        let now = Utc::now();
        source.process_atom_and_value(0, 0, now, now, json!(1.0), 7, 3, Some(json!({"x": 1})));

        let mut clone = new_monitor(&formula);
        clone.copy_slot(&source, 0, 0);
        assert_eq!(
            clone.atom_to_observation[&0][&0],
            source.atom_to_observation[&0][&0]
        );
        assert_eq!(clone.atom_to_program_path[&0][&0], 3);
        assert_eq!(clone.atom_to_state_dict[&0][&0], Some(json!({"x": 1})));
        // copying evidence does not by itself set a truth value
        assert_eq!(clone.verdict(), Verdict::Inconclusive);
    }
}
