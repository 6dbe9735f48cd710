//! Symbolic control-flow graph construction.
//!
//! An SCFG is a control-flow graph whose vertices are program states
//! induced by name-binding changes, with explicit synthetic vertices at
//! conditional, try/except and loop boundaries. The graph feeds two
//! consumers: the instrumentation stage (via the branch entry log) and the
//! path grammar used by the monitor to reconstruct execution paths at
//! verdict time.
//!
//! Typical use:
//!
//! ```rust
//! use vigil_scfg::ast::{Expr, Stmt};
//! use vigil_scfg::Scfg;
//!
//! let body = vec![
//!     Stmt::assign(Expr::name("x"), Expr::Num { n: 1 }),
//!     Stmt::assign(Expr::name("y"), Expr::call(Expr::name("f"), vec![Expr::name("x")])),
//! ];
//! let scfg = Scfg::from_block(&body, vec![], &["a".to_string()]).unwrap();
//! let grammar = scfg.derive_grammar();
//! assert_eq!(grammar.len(), scfg.vertices.len());
//! ```

pub mod ast;
pub mod builder;
pub mod error;
pub mod grammar;
pub mod graph;
pub mod names;

pub use error::{Result, ScfgError};
pub use grammar::{Grammar, Rule, Symbol};
pub use graph::{
    BranchEntry, Edge, EdgeId, EdgeInstruction, Guard, OperandSet, Scfg, Vertex, VertexId,
    VertexKind,
};
