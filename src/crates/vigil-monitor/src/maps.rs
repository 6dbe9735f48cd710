//! Per-(function, property) monitoring state.
//!
//! A [`PropertyMapGroup`] holds everything one property needs across one
//! run of one function: the compiled formula, the persisted binding space,
//! the live monitors per static binding index, the verdict report and the
//! call's program path. Groups are created at startup from the binding
//! space dumps instrumentation left behind, reset on function start, and
//! drained on function end.

use crate::error::{MonitorError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use vigil_formula::{Formula, FormulaMonitor};
use vigil_verdict_client::VerdictReport;

/// Directory under the project root holding binding-space dumps.
pub const BINDING_SPACE_DIR: &str = "binding_spaces";

/// Compiled formulas keyed by property hash. Property compilation happens
/// outside this crate; integrators register the formulas instrumentation
/// was run against.
pub type FormulaRegistry = HashMap<String, Formula>;

/// One static quantifier binding: the program points (statement lines) each
/// bind variable points at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub statement_lines: Vec<u64>,
}

/// The binding-space artifact produced by instrumentation: one entry per
/// static quantifier binding, indexed by position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingSpace(pub Vec<Binding>);

/// Monitoring state for one function and one property.
#[derive(Debug)]
pub struct PropertyMapGroup {
    pub formula_structure: Formula,
    pub binding_space: BindingSpace,
    /// Live monitors per static quantifier-binding index, in instantiation
    /// order.
    pub static_qd_to_monitors: HashMap<usize, Vec<FormulaMonitor>>,
    pub verdict_report: VerdictReport,
    pub latest_time_of_call: Option<DateTime<Utc>>,
    /// Branch labels taken by the current call.
    pub program_path: Vec<i64>,
}

impl PropertyMapGroup {
    /// Fresh state for a formula, with the given binding space.
    pub fn new(formula_structure: Formula, binding_space: BindingSpace) -> Self {
        PropertyMapGroup {
            formula_structure,
            binding_space,
            static_qd_to_monitors: HashMap::new(),
            verdict_report: VerdictReport::new(),
            latest_time_of_call: None,
            program_path: Vec::new(),
        }
    }

    /// Load the binding-space dump for a (module, function, property)
    /// triple and build the group.
    pub fn load(
        project_root: &str,
        name: &DumpName,
        formula_structure: Formula,
    ) -> Result<Self> {
        let path = Path::new(project_root)
            .join(BINDING_SPACE_DIR)
            .join(name.file_name());
        if !path.is_file() {
            return Err(MonitorError::MissingBindingSpace(
                path.display().to_string(),
            ));
        }
        let bytes = std::fs::read(&path)?;
        let binding_space: BindingSpace = bincode::deserialize(&bytes)?;
        debug!(
            function = %name.function,
            property = %name.property_hash,
            bindings = binding_space.0.len(),
            "loaded binding space"
        );
        Ok(PropertyMapGroup::new(formula_structure, binding_space))
    }
}

/// Parsed binding-space dump file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpName {
    pub module: String,
    pub function: String,
    pub property_hash: String,
}

impl DumpName {
    /// `module-<mod>-function-<fn>-property-<hash>.dump`, with dots in the
    /// module and colons in the function flattened to dashes.
    pub fn file_name(&self) -> String {
        format!(
            "module-{}-function-{}-property-{}.dump",
            self.module.replace('.', "-"),
            self.function.replace(':', "-"),
            self.property_hash
        )
    }

    /// Qualified function identifier used to key the consumer's maps.
    pub fn qualified_function(&self, machine_prefix: &str) -> String {
        format!("{}{}.{}", machine_prefix, self.module, self.function)
    }

    /// Parse a dump file stem back into its components.
    pub fn parse(stem: &str) -> Option<DumpName> {
        let tokens: Vec<&str> = stem.split('-').collect();
        let module_start = tokens.iter().position(|t| *t == "module")? + 1;
        let function_start = tokens.iter().position(|t| *t == "function")? + 1;
        let property_start = tokens.iter().position(|t| *t == "property")? + 1;
        if module_start > function_start || function_start > property_start {
            return None;
        }
        Some(DumpName {
            module: tokens[module_start..function_start - 1].join("."),
            function: tokens[function_start..property_start - 1].join(":"),
            property_hash: tokens[property_start..].join("-"),
        })
    }
}

/// Scan the binding-space directory for dump files.
pub fn discover_binding_spaces(project_root: &str) -> Result<Vec<DumpName>> {
    let dir = Path::new(project_root).join(BINDING_SPACE_DIR);
    if !dir.is_dir() {
        return Err(MonitorError::MissingBindingSpace(dir.display().to_string()));
    }
    let mut names = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let path: PathBuf = entry?.path();
        let file_name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => continue,
        };
        if let Some(stem) = file_name.strip_suffix(".dump") {
            if let Some(parsed) = DumpName::parse(stem) {
                names.push(parsed);
            }
        }
    }
    Ok(names)
}
