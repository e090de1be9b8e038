//! Error types for the core crate.

use thiserror::Error;

/// Errors raised by background services and configuration loading.
///
/// Registry and reclaimer operations never fail on the request path, so
/// these only surface from lifecycle management and startup.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Service already started.
    #[error("{0} already started")]
    AlreadyStarted(&'static str),

    /// Service not started.
    #[error("{0} not started")]
    NotStarted(&'static str),

    /// Background task failed to stop cleanly.
    #[error("shutdown error: {0}")]
    Shutdown(String),

    /// Background work died before producing a result.
    #[error("task failed: {0}")]
    TaskFailed(String),

    /// Environment variable present but unparseable.
    #[error("invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
