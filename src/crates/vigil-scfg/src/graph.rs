//! Core SCFG data structures.
//!
//! Vertices correspond to program states: a new state is induced whenever
//! the value bound to a name changes. Edges carry the statement (or
//! control-flow transition) that moves execution between states. The graph
//! is arena-allocated; vertices and edges are addressed by index so that
//! loop back-edges and the `previous_edge` / `post_merge` back-references
//! never form ownership cycles.

use crate::ast::{Expr, Stmt};
use crate::error::{Result, ScfgError};
use crate::names::{attr_name_string, callee_name, function_names_in};
use std::collections::HashSet;

/// Index of a vertex in [`Scfg::vertices`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(pub usize);

/// Index of an edge in [`Scfg::edges`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub usize);

/// What a vertex represents.
///
/// `State` vertices carry the names whose bindings change at that point.
/// The remaining kinds are synthetic control-flow vertices inserted by the
/// builder at branch and loop boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexKind {
    State,
    Conditional,
    PostConditional,
    TryCatch,
    PostTryCatch,
    Loop,
    PostLoop,
}

impl VertexKind {
    /// Sentinel label for synthetic kinds, mirroring the wire names used by
    /// instrumentation.
    pub fn label(self) -> &'static str {
        match self {
            VertexKind::State => "state",
            VertexKind::Conditional => "conditional",
            VertexKind::PostConditional => "post-conditional",
            VertexKind::TryCatch => "try-catch",
            VertexKind::PostTryCatch => "post-try-catch",
            VertexKind::Loop => "loop",
            VertexKind::PostLoop => "post-loop",
        }
    }

    /// True for the three merge kinds that terminate a subgraph.
    pub fn is_post(self) -> bool {
        matches!(
            self,
            VertexKind::PostConditional | VertexKind::PostTryCatch | VertexKind::PostLoop
        )
    }
}

/// A guard on an edge.
///
/// Statement edges accumulate the tests (and negated tests) of the branches
/// that lead to them; synthetic edges carry a sentinel label instead.
#[derive(Debug, Clone, PartialEq)]
pub enum Guard {
    /// A branch test that must hold.
    Test(Expr),
    /// A branch test that must not hold.
    Negated(Expr),
    /// Control-flow sentinel (`conditional`, `loop-skip`, ...).
    Label(&'static str),
}

/// The instruction an edge carries.
#[derive(Debug, Clone, PartialEq)]
pub enum EdgeInstruction {
    /// A real statement from the function body.
    Statement(Stmt),
    /// A synthetic control-flow transition, labelled by kind.
    ControlFlow(&'static str),
}

impl EdgeInstruction {
    /// True if the instruction is a return or raise, i.e. the branch it
    /// ends cannot fall through to a merge vertex.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            EdgeInstruction::Statement(Stmt::Return { .. })
                | EdgeInstruction::Statement(Stmt::Raise { .. })
        )
    }
}

/// The names an edge's instruction reads or writes.
///
/// A plain single-target assignment stores its write target as a scalar;
/// everything else stores a name list. Synthetic edges operate on nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum OperandSet {
    /// Single write target of a non-call assignment.
    Target(String),
    /// Name list (targets and/or callee names).
    Names(Vec<String>),
    /// Synthetic control-flow edge.
    ControlFlow,
}

/// A program state.
#[derive(Debug, Clone)]
pub struct Vertex {
    pub kind: VertexKind,
    /// Names whose bindings change at this state. Empty for synthetic
    /// vertices; their identity lives in `kind`.
    pub names_changed: Vec<String>,
    /// Statement distance from the start of the current branch. `None` for
    /// synthetic vertices.
    pub path_length: Option<usize>,
    /// Back-reference to the AST node that induced a synthetic vertex.
    pub structure_obj: Option<Stmt>,
    /// Outgoing edges, in insertion order.
    pub outgoing: Vec<EdgeId>,
    /// The edge that last set this vertex as its target, if any. A weak
    /// back-reference: an index, never ownership.
    pub previous_edge: Option<EdgeId>,
    /// For `Conditional` and `TryCatch` vertices: the merge vertex, if one
    /// was created. `None` when every branch terminated in return/raise.
    pub post_merge: Option<VertexId>,
}

impl Vertex {
    /// An empty state vertex (the graph's starting point).
    pub fn empty() -> Self {
        Vertex {
            kind: VertexKind::State,
            names_changed: Vec::new(),
            path_length: None,
            structure_obj: None,
            outgoing: Vec::new(),
            previous_edge: None,
            post_merge: None,
        }
    }

    /// A synthetic control-flow vertex.
    pub fn synthetic(kind: VertexKind, structure_obj: Option<Stmt>) -> Self {
        Vertex {
            kind,
            names_changed: Vec::new(),
            path_length: None,
            structure_obj,
            outgoing: Vec::new(),
            previous_edge: None,
            post_merge: None,
        }
    }

    /// Build a state vertex from a statement, deriving `names_changed`.
    ///
    /// The rules:
    /// - assignment of a call: flattened targets plus callee names
    /// - bare call: callee names, plus every reference variable when the
    ///   call has positional arguments (conservative may-mutate)
    /// - plain assignment: the single target attribute path
    /// - return of a call: callee names, otherwise nothing
    /// - raise: the raised exception's class name
    /// - pass: the literal sentinel `pass`
    pub fn from_statement(
        stmt: &Stmt,
        path_length: usize,
        reference_variables: &[String],
    ) -> Result<Self> {
        let names_changed = match stmt {
            Stmt::Assign { targets, value } if matches!(value, Expr::Call { .. }) => {
                let mut names = flatten_targets(targets)?;
                names.extend(function_names_in(value)?);
                names
            }
            Stmt::Assign { targets, .. } => {
                vec![target_name(&targets[0])?]
            }
            Stmt::Expr { value } if matches!(value, Expr::Call { .. }) => {
                let mut names = function_names_in(value)?;
                if call_has_args(value) {
                    names.extend(reference_variables.iter().cloned());
                }
                names
            }
            Stmt::Return { value: Some(value) } if matches!(value, Expr::Call { .. }) => {
                function_names_in(value)?
            }
            Stmt::Return { .. } => Vec::new(),
            Stmt::Raise { exc } => vec![callee_name(exc)?],
            Stmt::Pass => vec!["pass".to_string()],
            _ => return Err(ScfgError::UnsupportedNode("state vertex statement")),
        };
        Ok(Vertex {
            kind: VertexKind::State,
            names_changed,
            path_length: Some(path_length),
            structure_obj: None,
            outgoing: Vec::new(),
            previous_edge: None,
            post_merge: None,
        })
    }
}

/// A statement or control-flow transition between two states.
#[derive(Debug, Clone)]
pub struct Edge {
    /// Guards accumulated along the branch. Copied at construction so later
    /// additions to the caller's condition list do not retroactively affect
    /// recorded edges.
    pub condition: Vec<Guard>,
    pub instruction: EdgeInstruction,
    pub operates_on: OperandSet,
    /// Variables that reach this edge by non-assignment means: function
    /// parameters and loop-iteration variables.
    pub input_variables: Vec<String>,
    pub source: VertexId,
    pub target: VertexId,
}

/// Derive the operand set of an instruction, per the same rules as
/// [`Vertex::from_statement`] except that a plain single-target assignment
/// stores its target as a scalar.
pub fn operands_of(instruction: &EdgeInstruction) -> Result<OperandSet> {
    let stmt = match instruction {
        EdgeInstruction::ControlFlow(_) => return Ok(OperandSet::ControlFlow),
        EdgeInstruction::Statement(stmt) => stmt,
    };
    let operands = match stmt {
        Stmt::Assign { targets, value } if matches!(value, Expr::Call { .. }) => {
            let mut names = flatten_targets(targets)?;
            names.extend(function_names_in(value)?);
            OperandSet::Names(names)
        }
        Stmt::Assign { targets, .. } => OperandSet::Target(target_name(&targets[0])?),
        Stmt::Expr { value } if matches!(value, Expr::Call { .. }) => {
            OperandSet::Names(function_names_in(value)?)
        }
        Stmt::Return { value: Some(value) } if matches!(value, Expr::Call { .. }) => {
            OperandSet::Names(function_names_in(value)?)
        }
        Stmt::Return { .. } => OperandSet::Names(Vec::new()),
        Stmt::Raise { exc } => OperandSet::Names(vec![callee_name(exc)?]),
        Stmt::Pass => OperandSet::Names(vec!["pass".to_string()]),
        _ => return Err(ScfgError::UnsupportedNode("edge instruction")),
    };
    Ok(operands)
}

fn flatten_targets(targets: &[Expr]) -> Result<Vec<String>> {
    match &targets[0] {
        Expr::Tuple { elts } => elts.iter().map(target_name).collect(),
        other => Ok(vec![target_name(other)?]),
    }
}

fn target_name(target: &Expr) -> Result<String> {
    attr_name_string(target, false).ok_or(ScfgError::UnnamedTarget("assignment target"))
}

fn call_has_args(expr: &Expr) -> bool {
    matches!(expr, Expr::Call { args, .. } if !args.is_empty())
}

/// Entries logged for each branch or loop entry point, consumed by the
/// instrumentation stage to place path-recording instruments.
#[derive(Debug, Clone)]
pub enum BranchEntry {
    /// A conditional branch body: its first statement and branch index.
    Conditional { stmt: Stmt, branch_index: usize },
    /// A conditional without an else: the `if` node and its branch count.
    ConditionalNoElse { stmt: Stmt, branch_count: usize },
    /// The statement after a conditional that is not last in its block.
    PostConditional { stmt: Stmt },
    /// A try or handler body entry, with its role tag.
    TryCatch { stmt: Stmt, role: &'static str },
    /// The statement after a try that is not last in its block.
    PostTryCatch { stmt: Stmt },
    /// A loop body entry paired with the loop statement itself, marking the
    /// enter-loop and end-loop instrument positions.
    Loop { body_entry: Stmt, loop_stmt: Stmt },
}

/// A symbolic control-flow graph.
#[derive(Debug)]
pub struct Scfg {
    pub vertices: Vec<Vertex>,
    pub edges: Vec<Edge>,
    /// The single empty vertex created at construction.
    pub start: VertexId,
    /// Vertices whose inbound edge is a return statement.
    pub return_statements: Vec<VertexId>,
    pub branch_initial_statements: Vec<BranchEntry>,
    /// Names treated as possibly-mutated side-effect targets of calls.
    pub reference_variables: Vec<String>,
}

impl Scfg {
    /// A graph containing only the starting vertex.
    pub fn new(reference_variables: Vec<String>) -> Self {
        let mut scfg = Scfg {
            vertices: Vec::new(),
            edges: Vec::new(),
            start: VertexId(0),
            return_statements: Vec::new(),
            branch_initial_statements: Vec::new(),
            reference_variables,
        };
        scfg.start = scfg.add_vertex(Vertex::empty());
        scfg
    }

    /// Build the SCFG of a whole function body.
    pub fn from_block(
        block: &[Stmt],
        reference_variables: Vec<String>,
        input_variables: &[String],
    ) -> Result<Self> {
        let mut scfg = Scfg::new(reference_variables);
        let start = scfg.start;
        scfg.process_block(block, &[start], &[], input_variables)?;
        Ok(scfg)
    }

    pub fn add_vertex(&mut self, vertex: Vertex) -> VertexId {
        let id = VertexId(self.vertices.len());
        self.vertices.push(vertex);
        id
    }

    /// Create an edge with both endpoints wired before it is published:
    /// the id is appended to the source's outgoing list and installed as the
    /// target's `previous_edge`.
    pub fn connect(
        &mut self,
        source: VertexId,
        target: VertexId,
        condition: Vec<Guard>,
        instruction: EdgeInstruction,
        input_variables: Vec<String>,
    ) -> Result<EdgeId> {
        let operates_on = operands_of(&instruction)?;
        let id = EdgeId(self.edges.len());
        self.edges.push(Edge {
            condition,
            instruction,
            operates_on,
            input_variables,
            source,
            target,
        });
        self.vertices[source.0].outgoing.push(id);
        self.vertices[target.0].previous_edge = Some(id);
        Ok(id)
    }

    pub fn vertex(&self, id: VertexId) -> &Vertex {
        &self.vertices[id.0]
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.0]
    }

    /// Kind of the vertex an edge points at.
    pub(crate) fn target_kind(&self, edge: EdgeId) -> VertexKind {
        self.vertices[self.edges[edge.0].target.0].kind
    }

    /// True when the vertex's inbound edge carries a return or raise.
    pub(crate) fn ends_in_terminator(&self, vertex: VertexId) -> bool {
        match self.vertices[vertex.0].previous_edge {
            Some(edge) => self.edges[edge.0].instruction.is_terminator(),
            None => false,
        }
    }

    /// Depth-first search from `vertex` for edges that model calls to
    /// `function`, either a bare call statement or an assignment from a
    /// call. Matches accumulate into `calls`; `visited` breaks the cycles
    /// introduced by loop back-edges. Callers pass fresh accumulators.
    pub fn next_calls(
        &self,
        vertex: VertexId,
        function: &str,
        calls: &mut Vec<EdgeId>,
        visited: &mut HashSet<VertexId>,
    ) {
        if !visited.insert(vertex) {
            return;
        }
        for &edge_id in &self.vertices[vertex.0].outgoing {
            let edge = &self.edges[edge_id.0];
            let callee_names = match &edge.instruction {
                EdgeInstruction::Statement(Stmt::Expr { value })
                | EdgeInstruction::Statement(Stmt::Assign { value, .. })
                    if matches!(value, Expr::Call { .. }) =>
                {
                    function_names_in(value).unwrap_or_default()
                }
                _ => Vec::new(),
            };
            if callee_names.iter().any(|name| name == function) {
                calls.push(edge_id);
            } else {
                self.next_calls(edge.target, function, calls, visited);
            }
        }
    }
}
