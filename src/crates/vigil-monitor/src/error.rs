//! Error types for monitoring setup and runtime.

use thiserror::Error;
use vigil_verdict_client::SinkError;

/// Result type for monitoring operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Errors raised while setting up or running verification.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// Invalid or incomplete configuration. Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The persisted binding-space artifact for an instrumented function is
    /// absent. Fatal: run instrumentation before starting the service.
    #[error("binding space artifact missing: {0} (run instrumentation first)")]
    MissingBindingSpace(String),

    /// A property hash found on disk has no registered formula.
    #[error("no formula registered for property hash {0}")]
    UnknownProperty(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A binding-space dump could not be decoded.
    #[error("binding space decode error: {0}")]
    Decode(#[from] bincode::Error),

    /// The configuration file could not be parsed.
    #[error("configuration parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error(transparent)]
    Sink(#[from] SinkError),
}
