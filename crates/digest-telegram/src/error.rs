//! Error types for the Telegram bot.

use digest_pipeline::PipelineError;
use thiserror::Error;

/// Errors that can occur in the Telegram bot.
#[derive(Debug, Error)]
pub enum BotError {
    /// Bot token not provided.
    #[error("Telegram bot token not set. Set TELEGRAM_BOT_TOKEN environment variable.")]
    NoToken,

    /// Callback data that no keyboard produces.
    #[error("invalid callback data: {0}")]
    InvalidCallback(String),

    /// Telegram API request failed.
    #[error("Telegram request failed: {0}")]
    Request(#[from] teloxide::RequestError),

    /// Report pipeline failure.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Result type for bot operations.
pub type Result<T> = std::result::Result<T, BotError>;
