//! AST node model consumed by the SCFG builder.
//!
//! The host runtime parses source text and hands us function bodies in this
//! shape. Nodes are plain data; the builder and the name-extraction helpers
//! pattern-match on them. Unknown shapes inside a name chain surface as
//! [`ScfgError::UnsupportedNode`](crate::error::ScfgError::UnsupportedNode).

use serde::{Deserialize, Serialize};

/// An expression node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// A bare name, e.g. `x`.
    Name { id: String },
    /// Attribute access, e.g. `obj.field`.
    Attribute { value: Box<Expr>, attr: String },
    /// A call expression. The callee chain lives in `func`.
    Call { func: Box<Expr>, args: Vec<Expr> },
    /// Subscript access, e.g. `xs[0]`. The slice is normally an [`Expr::Index`].
    Subscript { value: Box<Expr>, slice: Box<Expr> },
    /// Numeric literal.
    Num { n: i64 },
    /// String literal.
    Str { s: String },
    /// Tuple expression, e.g. an unpacking target `(a, b)`.
    Tuple { elts: Vec<Expr> },
    /// Load context marker.
    Load,
    /// Index wrapper around a subscript slice value.
    Index { value: Box<Expr> },
}

/// A statement node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// Assignment, e.g. `x = f(y)`. Multiple targets model tuple unpacking.
    Assign { targets: Vec<Expr>, value: Expr },
    /// A bare expression statement, usually a call.
    Expr { value: Expr },
    /// `return`, with an optional value.
    Return { value: Option<Expr> },
    /// `raise SomeError(...)`.
    Raise { exc: Expr },
    /// `pass`.
    Pass,
    /// Conditional with elif chains encoded as a nested `If` in `orelse`.
    If {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    /// Try with one or more exception handlers.
    Try {
        body: Vec<Stmt>,
        handlers: Vec<ExceptHandler>,
    },
    /// `for target in iter: body`.
    For {
        target: Expr,
        iter: Expr,
        body: Vec<Stmt>,
    },
    /// `while test: body`.
    While { test: Expr, body: Vec<Stmt> },
}

/// A single `except` clause body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptHandler {
    pub body: Vec<Stmt>,
}

impl Expr {
    /// A bare name expression.
    pub fn name(id: impl Into<String>) -> Self {
        Expr::Name { id: id.into() }
    }

    /// An attribute access on `value`.
    pub fn attribute(value: Expr, attr: impl Into<String>) -> Self {
        Expr::Attribute {
            value: Box::new(value),
            attr: attr.into(),
        }
    }

    /// A call with the given callee and arguments.
    pub fn call(func: Expr, args: Vec<Expr>) -> Self {
        Expr::Call {
            func: Box::new(func),
            args,
        }
    }

    /// A subscript with an index-wrapped slice.
    pub fn subscript(value: Expr, slice: Expr) -> Self {
        Expr::Subscript {
            value: Box::new(value),
            slice: Box::new(Expr::Index {
                value: Box::new(slice),
            }),
        }
    }
}

impl Stmt {
    /// Single-target assignment.
    pub fn assign(target: Expr, value: Expr) -> Self {
        Stmt::Assign {
            targets: vec![target],
            value,
        }
    }

    /// A bare call statement.
    pub fn call(func: Expr, args: Vec<Expr>) -> Self {
        Stmt::Expr {
            value: Expr::call(func, args),
        }
    }
}
