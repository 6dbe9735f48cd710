//! Attribute-path and callee-name extraction.
//!
//! These helpers turn AST expression nodes into stable dotted/bracketed
//! strings. They are deterministic pure functions of the subtree: the same
//! node always produces the same strings, which is what lets vertices and
//! edges key monitor state off them.

use crate::ast::{Expr, Stmt};
use crate::error::{Result, ScfgError};

/// Collect the fully qualified callee name of every call descendant of `expr`.
///
/// The callee chain is walked outward: attributes contribute a prefix
/// segment, a name terminates the chain as the root, subscripts are
/// traversed but their index is not part of the name, and string literals
/// end the chain without contributing a segment.
pub fn function_names_in(expr: &Expr) -> Result<Vec<String>> {
    let mut calls = Vec::new();
    collect_calls(expr, &mut calls);

    let mut names = Vec::with_capacity(calls.len());
    for call in calls {
        names.push(callee_chain(call)?);
    }
    Ok(names)
}

/// Like [`function_names_in`], but over every expression in a statement.
pub fn function_names_in_stmt(stmt: &Stmt) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for expr in statement_exprs(stmt) {
        names.extend(function_names_in(expr)?);
    }
    Ok(names)
}

/// Resolve one call's callee chain to a dotted name.
pub fn callee_name(call: &Expr) -> Result<String> {
    callee_chain(call)
}

fn callee_chain(call: &Expr) -> Result<String> {
    let mut segments: Vec<&str> = Vec::new();
    let mut current = call;
    loop {
        match current {
            Expr::Call { func, .. } => current = func,
            Expr::Attribute { value, attr } => {
                segments.push(attr);
                current = value;
            }
            Expr::Name { id } => {
                segments.push(id);
                break;
            }
            Expr::Str { .. } => break,
            Expr::Subscript { value, .. } => current = value,
            _ => return Err(ScfgError::UnsupportedNode("callee chain")),
        }
    }
    segments.reverse();
    Ok(segments.join("."))
}

fn collect_calls<'a>(expr: &'a Expr, out: &mut Vec<&'a Expr>) {
    if matches!(expr, Expr::Call { .. }) {
        out.push(expr);
    }
    match expr {
        Expr::Attribute { value, .. } | Expr::Index { value } => collect_calls(value, out),
        Expr::Call { func, args } => {
            collect_calls(func, out);
            for arg in args {
                collect_calls(arg, out);
            }
        }
        Expr::Subscript { value, slice } => {
            collect_calls(value, out);
            collect_calls(slice, out);
        }
        Expr::Tuple { elts } => {
            for elt in elts {
                collect_calls(elt, out);
            }
        }
        Expr::Name { .. } | Expr::Num { .. } | Expr::Str { .. } | Expr::Load => {}
    }
}

fn statement_exprs(stmt: &Stmt) -> Vec<&Expr> {
    match stmt {
        Stmt::Assign { targets, value } => {
            let mut exprs: Vec<&Expr> = targets.iter().collect();
            exprs.push(value);
            exprs
        }
        Stmt::Expr { value } => vec![value],
        Stmt::Return { value } => value.iter().collect(),
        Stmt::Raise { exc } => vec![exc],
        _ => vec![],
    }
}

/// Tokens of `expr` from innermost to outermost.
///
/// `A.b[0].c` yields `["c", "[0]", "b", "A"]`. Subscripts format as
/// `["literal"]`, `[n]` or `[name]` unless `omit_subscripts` is set, in
/// which case they are elided entirely. Shapes outside the contract yield
/// `None`.
pub fn reversed_string_list(expr: &Expr, omit_subscripts: bool) -> Option<Vec<String>> {
    match expr {
        Expr::Name { id } => Some(vec![id.clone()]),
        Expr::Attribute { value, attr } => {
            let mut tokens = vec![attr.clone()];
            tokens.extend(reversed_string_list(value, omit_subscripts)?);
            Some(tokens)
        }
        Expr::Subscript { value, slice } => {
            if omit_subscripts {
                return reversed_string_list(value, omit_subscripts);
            }
            let inner = match &**slice {
                Expr::Index { value } => &**value,
                other => other,
            };
            let formatted = match inner {
                Expr::Str { s } => format!("[\"{}\"]", s),
                Expr::Num { n } => format!("[{}]", n),
                Expr::Name { id } => format!("[{}]", id),
                _ => return None,
            };
            let mut tokens = vec![formatted];
            tokens.extend(reversed_string_list(value, omit_subscripts)?);
            Some(tokens)
        }
        Expr::Call { .. } => function_names_in(expr).ok(),
        Expr::Str { s } => Some(vec![s.clone()]),
        _ => None,
    }
}

/// Join the tokens of `expr` into a dotted attribute string.
///
/// Returns `None` for load/index contexts, for unsupported shapes, and when
/// an intermediate token already contains a dot while multiple tokens exist.
/// Such composite names are covered by the individual sub-traversals that
/// produced them.
pub fn attr_name_string(expr: &Expr, omit_subscripts: bool) -> Option<String> {
    if matches!(expr, Expr::Load | Expr::Index { .. }) {
        return None;
    }
    let mut tokens = reversed_string_list(expr, omit_subscripts)?;
    tokens.reverse();

    let mut joined = String::new();
    for (n, part) in tokens.iter().enumerate() {
        if part.contains('.') && tokens.len() > 1 {
            return None;
        }
        if part.starts_with('[') {
            joined.push_str(part);
        } else {
            if n != 0 {
                joined.push('.');
            }
            joined.push_str(part);
        }
    }
    Some(joined)
}
