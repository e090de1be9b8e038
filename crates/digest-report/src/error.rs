//! Error types for report generation.

use thiserror::Error;

/// Errors raised while generating or rendering a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Missing API key or other setup problem.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// HTTP transport failure.
    #[error("request failed: {0}")]
    Request(String),

    /// Provider answered with a non-success status.
    #[error("{provider} API error {status}: {body}")]
    Api {
        provider: &'static str,
        status: u16,
        body: String,
    },

    /// Provider answer could not be turned into report data.
    #[error("failed to parse model response: {0}")]
    Parse(String),

    /// Nothing to summarize.
    #[error("no text messages to process")]
    NoMessages,

    /// Prompt file missing or unreadable.
    #[error("prompt not available at {path}: {reason}")]
    Prompt { path: String, reason: String },

    /// Document rendering failed.
    #[error("render error: {0}")]
    Render(String),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ReportError {
    /// Whether the error comes from setup rather than the request.
    pub fn is_configuration(&self) -> bool {
        matches!(self, ReportError::Configuration(_) | ReportError::Prompt { .. })
    }
}

/// Result type for report operations.
pub type Result<T> = std::result::Result<T, ReportError>;
