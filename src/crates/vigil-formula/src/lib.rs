//! Property formulas and their monitors.
//!
//! A [`Formula`] is a compiled temporal property: a boolean tree over
//! [`Atom`]s, together with the ordered quantifier (bind) variables the
//! property ranges over. A [`FormulaMonitor`] evaluates one formula
//! instance against one concrete binding, updating atom truth values as
//! observations arrive and collapsing to a verdict as soon as the tree is
//! determined.

pub mod formula;
pub mod monitor;

pub use formula::{lnot, Atom, AtomRef, Formula, FormulaTree, Predicate, Verdict};
pub use monitor::{new_monitor, FormulaMonitor, Observation};
