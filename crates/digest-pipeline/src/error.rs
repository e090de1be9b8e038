//! Error types for the pipeline.

use digest_models::{PeriodError, UnknownOption};
use digest_persistence::PersistenceError;
use digest_report::ReportError;
use thiserror::Error;

/// Errors raised while fetching messages or producing a report.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Request parameters missing or malformed.
    #[error("{0}")]
    InvalidRequest(String),

    /// The window produced no messages.
    #[error("no messages found in the requested period")]
    NoMessages,

    /// Requested artifact does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Missing credentials, channel lists or prompts.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Scraping session failed as a whole.
    #[error("scrape failed: {0}")]
    Scrape(String),

    /// Artifact store failure.
    #[error("storage error: {0}")]
    Storage(#[from] PersistenceError),

    /// LLM or rendering failure.
    #[error("report error: {0}")]
    Report(ReportError),

    /// Background task died.
    #[error("task failed: {0}")]
    TaskFailed(String),
}

impl From<PeriodError> for PipelineError {
    fn from(e: PeriodError) -> Self {
        PipelineError::InvalidRequest(e.to_string())
    }
}

impl From<UnknownOption> for PipelineError {
    fn from(e: UnknownOption) -> Self {
        PipelineError::InvalidRequest(e.to_string())
    }
}

impl From<ReportError> for PipelineError {
    fn from(e: ReportError) -> Self {
        match e {
            ReportError::NoMessages => PipelineError::NoMessages,
            e if e.is_configuration() => PipelineError::Configuration(e.to_string()),
            e => PipelineError::Report(e),
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(e: serde_json::Error) -> Self {
        PipelineError::Storage(PersistenceError::Json(e))
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
