//! Error types for verdict sink operations.

use thiserror::Error;

/// Result type for sink operations.
pub type Result<T> = std::result::Result<T, SinkError>;

/// Errors from the verdict sink.
#[derive(Error, Debug)]
pub enum SinkError {
    /// The server could not be reached at all. Fatal for call-record
    /// submission; at startup it flags initialisation failure.
    #[error("verdict server unreachable: {0}")]
    Unavailable(String),

    /// A best-effort transmission failed. Callers log and continue.
    #[error("verdict transmission failed: {0}")]
    Transmission(String),

    /// The server answered with something we could not decode.
    #[error("unexpected response from verdict server: {0}")]
    InvalidResponse(String),
}
