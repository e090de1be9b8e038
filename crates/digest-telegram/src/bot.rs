//! Main Telegram bot implementation.

use std::future::Future;
use std::sync::Arc;

use teloxide::dispatching::UpdateFilterExt;
use teloxide::prelude::*;
use tracing::{info, warn};

use crate::error::{BotError, Result};
use crate::handlers::{handle_callback, handle_command, handle_message, Command};
use crate::state::BotState;

/// Message sent to users whose report was interrupted by a shutdown.
const SHUTDOWN_NOTICE: &str = "The bot is restarting. Your report was interrupted, please start it again.";

/// The Telegram bot for the digest pipeline.
pub struct DigestBot {
    /// The teloxide bot instance.
    bot: Bot,
    /// Shared state across handlers.
    state: Arc<BotState>,
}

impl DigestBot {
    /// Creates a bot from a token.
    pub fn new(token: Option<String>, state: Arc<BotState>) -> Result<Self> {
        let token = token
            .filter(|t| !t.trim().is_empty())
            .ok_or(BotError::NoToken)?;
        Ok(Self {
            bot: Bot::new(token),
            state,
        })
    }

    /// Shared state.
    pub fn state(&self) -> &Arc<BotState> {
        &self.state
    }

    /// Get the bot's username.
    pub async fn get_me(&self) -> Result<String> {
        let me = self.bot.get_me().await?;
        Ok(me.username().to_string())
    }

    /// Runs long polling until `shutdown` resolves, then stops running
    /// reports and tells their owners.
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let allowed = self.state.config().allowed_users.len();
        if allowed > 0 {
            info!(allowed, "Bot access restricted to allow list");
        } else {
            info!("Bot access open to all users");
        }

        let state_for_commands = Arc::clone(&self.state);
        let state_for_messages = Arc::clone(&self.state);
        let state_for_callbacks = Arc::clone(&self.state);

        let handler = dptree::entry()
            .branch(
                Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
                    let state = Arc::clone(&state_for_callbacks);
                    async move { handle_callback(bot, q, state).await }
                }),
            )
            .branch(
                Update::filter_message()
                    .filter_command::<Command>()
                    .endpoint(move |bot: Bot, msg: Message, cmd: Command| {
                        let state = Arc::clone(&state_for_commands);
                        info!(chat_id = %msg.chat.id, "Command matched: {:?}", cmd);
                        async move { handle_command(bot, msg, cmd, state).await }
                    }),
            )
            .branch(
                Update::filter_message()
                    .filter(|msg: Message| msg.text().is_some_and(|t| t.starts_with('/')))
                    .endpoint(|bot: Bot, msg: Message| async move {
                        if let Some(text) = msg.text() {
                            let cmd = text.split_whitespace().next().unwrap_or(text);
                            bot.send_message(
                                msg.chat.id,
                                format!("Unknown command: {}\n\nUse /help to see available commands.", cmd),
                            )
                            .await?;
                        }
                        Ok(())
                    }),
            )
            .branch(
                Update::filter_message()
                    .filter(|msg: Message| msg.text().is_some_and(|t| !t.starts_with('/')))
                    .endpoint(move |bot: Bot, msg: Message| {
                        let state = Arc::clone(&state_for_messages);
                        async move { handle_message(bot, msg, state).await }
                    }),
            );

        let mut dispatcher = Dispatcher::builder(self.bot.clone(), handler)
            .default_handler(|upd| async move {
                warn!("Unhandled update: {:?}", upd.kind);
            })
            .build();

        let token = dispatcher.shutdown_token();
        tokio::spawn(async move {
            shutdown.await;
            match token.shutdown() {
                Ok(stopped) => stopped.await,
                Err(e) => warn!(error = %e, "Dispatcher was not running at shutdown"),
            }
        });

        info!("Bot is running");
        dispatcher.dispatch().await;

        self.notify_interrupted().await;
        info!("Bot stopped");
    }

    async fn notify_interrupted(&self) {
        for task in self.state.cancel_all("interrupted by shutdown").await {
            if let Err(e) = self.bot.send_message(task.chat_id, SHUTDOWN_NOTICE).await {
                warn!(user_id = task.user_id, error = %e, "Failed to notify user about shutdown");
            }
        }
    }
}
