//! Telegram bot interface for the channel digest pipeline.
//!
//! The bot walks users through a short menu dialogue and runs the same
//! report pipeline as the REST API, sending the finished document back to
//! the chat.
//!
//! # Commands
//!
//! - `/start` - Begin a new report
//! - `/help` - Show available commands
//! - `/status` - Show the running report
//! - `/cancel` - Cancel the running report or the current menu
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use digest_telegram::{BotConfig, BotState, DigestBot};
//!
//! let state = Arc::new(BotState::new(pipeline, BotConfig::new().with_allowed_users([42])));
//! let bot = DigestBot::new(std::env::var("TELEGRAM_BOT_TOKEN").ok(), state)?;
//! bot.run(async { tokio::signal::ctrl_c().await.ok(); }).await;
//! ```

pub mod bot;
pub mod dialogue;
pub mod error;
pub mod handlers;
pub mod keyboards;
pub mod state;

pub use bot::DigestBot;
pub use dialogue::{Choice, Dialogue, LaunchRequest, Step, Transition};
pub use error::{BotError, Result};
pub use handlers::Command;
pub use state::{BotConfig, BotState, CancelledTask, DEFAULT_RATE_LIMIT};
