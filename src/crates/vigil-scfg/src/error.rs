//! Error types for SCFG construction.

use thiserror::Error;

/// Result type for SCFG operations.
pub type Result<T> = std::result::Result<T, ScfgError>;

/// Errors that can occur while building an SCFG or extracting names.
#[derive(Error, Debug)]
pub enum ScfgError {
    /// A name chain or statement contained a node kind outside the
    /// extraction contract.
    #[error("unsupported AST node in {0}")]
    UnsupportedNode(&'static str),

    /// A statement could not induce a state vertex (e.g. an assignment
    /// target with no attribute path).
    #[error("statement has no extractable name: {0}")]
    UnnamedTarget(&'static str),
}
