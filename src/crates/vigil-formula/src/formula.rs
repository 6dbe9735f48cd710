//! Formula trees and atoms.

use serde::{Deserialize, Serialize};

/// Truth state of a formula or monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    True,
    False,
    /// Not yet determined by the observations seen so far.
    Inconclusive,
}

/// The predicate an atom applies to its observed value(s).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    /// Observed numeric value strictly below the bound.
    LessThan(f64),
    /// Observed numeric value at or above the bound.
    AtLeast(f64),
    /// Observed value equal to the given JSON value.
    Equals(serde_json::Value),
    /// Observed numeric value within the closed interval.
    InInterval(f64, f64),
    /// Mixed-atom predicate: the absolute difference between the two
    /// sub-observations is strictly below the bound.
    DiffLessThan(f64),
}

impl Predicate {
    /// Evaluate against a single observation.
    pub fn holds(&self, value: &serde_json::Value) -> bool {
        match self {
            Predicate::LessThan(bound) => value.as_f64().map(|v| v < *bound).unwrap_or(false),
            Predicate::AtLeast(bound) => value.as_f64().map(|v| v >= *bound).unwrap_or(false),
            Predicate::Equals(expected) => value == expected,
            Predicate::InInterval(lo, hi) => value
                .as_f64()
                .map(|v| v >= *lo && v <= *hi)
                .unwrap_or(false),
            Predicate::DiffLessThan(_) => false,
        }
    }

    /// Evaluate a mixed-atom predicate against two sub-observations.
    pub fn holds_pair(&self, first: &serde_json::Value, second: &serde_json::Value) -> bool {
        match self {
            Predicate::DiffLessThan(bound) => match (first.as_f64(), second.as_f64()) {
                (Some(a), Some(b)) => (a - b).abs() < *bound,
                _ => false,
            },
            single => single.holds(second),
        }
    }
}

/// The smallest observable predicate in a property formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    /// Position in [`Formula::atoms`].
    pub index: usize,
    /// Binding positions of the quantifier variables this atom observes.
    /// More than one position makes the atom *mixed*: its truth depends on
    /// values bound at several quantifier depths, observed one sub-index at
    /// a time.
    pub base_variables: Vec<usize>,
    pub predicate: Predicate,
}

impl Atom {
    /// An atom over a single quantifier variable.
    pub fn single(index: usize, base_variable: usize, predicate: Predicate) -> Self {
        Atom {
            index,
            base_variables: vec![base_variable],
            predicate,
        }
    }

    /// An atom spanning two quantifier variables.
    pub fn mixed(index: usize, base_variables: Vec<usize>, predicate: Predicate) -> Self {
        Atom {
            index,
            base_variables,
            predicate,
        }
    }

    /// True when the atom's base variables span multiple binding positions.
    pub fn is_mixed(&self) -> bool {
        self.base_variables.len() > 1
    }
}

/// A reference to an atom, possibly under negation. Monitors receive these
/// when truth values are replayed during cloning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtomRef {
    pub atom_index: usize,
    pub negated: bool,
}

impl AtomRef {
    pub fn positive(atom_index: usize) -> Self {
        AtomRef {
            atom_index,
            negated: false,
        }
    }
}

/// Logical negation of an atom reference.
pub fn lnot(atom: AtomRef) -> AtomRef {
    AtomRef {
        atom_index: atom.atom_index,
        negated: !atom.negated,
    }
}

/// Boolean structure over atom indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FormulaTree {
    Atom(usize),
    Not(Box<FormulaTree>),
    And(Vec<FormulaTree>),
    Or(Vec<FormulaTree>),
}

impl FormulaTree {
    /// Three-valued evaluation over per-atom truth states.
    pub fn evaluate(&self, states: &[Option<bool>]) -> Verdict {
        match self {
            FormulaTree::Atom(index) => match states.get(*index).copied().flatten() {
                Some(true) => Verdict::True,
                Some(false) => Verdict::False,
                None => Verdict::Inconclusive,
            },
            FormulaTree::Not(inner) => match inner.evaluate(states) {
                Verdict::True => Verdict::False,
                Verdict::False => Verdict::True,
                Verdict::Inconclusive => Verdict::Inconclusive,
            },
            FormulaTree::And(children) => {
                let mut verdict = Verdict::True;
                for child in children {
                    match child.evaluate(states) {
                        Verdict::False => return Verdict::False,
                        Verdict::Inconclusive => verdict = Verdict::Inconclusive,
                        Verdict::True => {}
                    }
                }
                verdict
            }
            FormulaTree::Or(children) => {
                let mut verdict = Verdict::False;
                for child in children {
                    match child.evaluate(states) {
                        Verdict::True => return Verdict::True,
                        Verdict::Inconclusive => verdict = Verdict::Inconclusive,
                        Verdict::False => {}
                    }
                }
                verdict
            }
        }
    }
}

/// A compiled property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formula {
    /// Ordered quantifier variables; their positions are the binding
    /// positions atoms refer to.
    pub bind_variables: Vec<String>,
    pub atoms: Vec<Atom>,
    pub tree: FormulaTree,
}

impl Formula {
    /// A property whose verdict is the conjunction of all its atoms.
    pub fn conjunction(bind_variables: Vec<String>, atoms: Vec<Atom>) -> Self {
        let tree = FormulaTree::And(atoms.iter().map(|a| FormulaTree::Atom(a.index)).collect());
        Formula {
            bind_variables,
            atoms,
            tree,
        }
    }

    pub fn atom(&self, index: usize) -> &Atom {
        &self.atoms[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_predicate_less_than() {
        assert!(Predicate::LessThan(2.0).holds(&json!(1.5)));
        assert!(!Predicate::LessThan(2.0).holds(&json!(2.0)));
        assert!(!Predicate::LessThan(2.0).holds(&json!("not a number")));
    }

    #[test]
    fn test_mixed_predicate_needs_both_values() {
        let p = Predicate::DiffLessThan(1.0);
        assert!(p.holds_pair(&json!(3.0), &json!(3.5)));
        assert!(!p.holds_pair(&json!(3.0), &json!(5.0)));
        assert!(!p.holds(&json!(3.0)));
    }

    #[test]
    fn test_tree_three_valued_and() {
        let tree = FormulaTree::And(vec![FormulaTree::Atom(0), FormulaTree::Atom(1)]);
        assert_eq!(tree.evaluate(&[Some(true), None]), Verdict::Inconclusive);
        assert_eq!(tree.evaluate(&[Some(true), Some(true)]), Verdict::True);
        // a single false atom decides the conjunction early
        assert_eq!(tree.evaluate(&[None, Some(false)]), Verdict::False);
    }

    #[test]
    fn test_lnot_flips() {
        let a = AtomRef::positive(3);
        assert!(lnot(a).negated);
        assert_eq!(lnot(lnot(a)), a);
    }
}
