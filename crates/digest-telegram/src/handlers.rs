//! Command, callback and message handlers for the Telegram bot.

use std::sync::Arc;

use digest_core::ScrapeGate;
use digest_pipeline::PipelineError;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, InputFile, MessageId, ParseMode};
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

use crate::dialogue::{Choice, LaunchRequest, Step, Transition};
use crate::keyboards::{keyboard_for, period_label, prompt_for, restart_keyboard};
use crate::state::BotState;

/// Bot commands that can be invoked with /.
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "Start a new report")]
    Start,

    #[command(description = "Show help message")]
    Help,

    #[command(description = "Show your running report")]
    Status,

    #[command(description = "Cancel the running report or the current menu")]
    Cancel,
}

const NOT_ALLOWED: &str = "Sorry, you do not have access to this bot.";

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn user_id_of(msg: &Message) -> Option<i64> {
    msg.from.as_ref().map(|u| u.id.0 as i64)
}

/// Sends the menu for `step` as a new message.
async fn send_menu(bot: &Bot, chat_id: ChatId, text: String, step: Step) -> ResponseResult<()> {
    bot.send_message(chat_id, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboard_for(step))
        .await?;
    Ok(())
}

/// Replaces the menu in `message_id` with the menu for `step`.
async fn edit_menu(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    text: String,
    step: Step,
) -> ResponseResult<()> {
    bot.edit_message_text(chat_id, message_id, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboard_for(step))
        .await?;
    Ok(())
}

/// Handle the /start command.
pub async fn handle_start(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let Some(user_id) = user_id_of(&msg) else {
        return Ok(());
    };
    state.reset_dialogue(user_id).await;

    let text = format!(
        "<b>Channel digest bot</b>\n\n\
        I scrape the tracked Telegram channels and turn them into a report.\n\n\
        {}",
        prompt_for(Step::Provider, &Default::default())
    );
    send_menu(&bot, msg.chat.id, text, Step::Provider).await?;

    info!(chat_id = %msg.chat.id, user_id, "User started bot");
    Ok(())
}

/// Handle the /help command.
pub async fn handle_help(bot: Bot, msg: Message) -> ResponseResult<()> {
    let help_text = format!(
        "{}\n\n\
        Pick a provider, channel list, report type, period and model. \
        The report file is sent here when it is ready, usually within a few minutes.",
        Command::descriptions()
    );
    bot.send_message(msg.chat.id, help_text).await?;
    Ok(())
}

/// Handle the /status command.
pub async fn handle_status(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let Some(user_id) = user_id_of(&msg) else {
        return Ok(());
    };

    let text = match state.active_job(user_id).await {
        Some(job_id) => {
            let stage = state
                .registry()
                .get(&job_id)
                .await
                .and_then(|p| p.get("stage").and_then(|s| s.as_str()).map(String::from))
                .unwrap_or_else(|| "starting".to_string());
            format!(
                "<b>Report in progress</b>\n\n<b>Job:</b> <code>{}</code>\n<b>Stage:</b> {}",
                html_escape(&job_id),
                html_escape(&stage)
            )
        }
        None => "No report is running. Use /start to create one.".to_string(),
    };

    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Handle the /cancel command.
pub async fn handle_cancel(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let Some(user_id) = user_id_of(&msg) else {
        return Ok(());
    };
    state.reset_dialogue(user_id).await;

    let text = match state.cancel_task(user_id, "cancelled by user").await {
        Some(task) => format!(
            "Report <code>{}</code> cancelled.",
            html_escape(&task.job_id)
        ),
        None => "Nothing to cancel. Use /start to create a report.".to_string(),
    };
    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(restart_keyboard())
        .await?;
    Ok(())
}

/// Dispatch a parsed command.
pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: Arc<BotState>,
) -> ResponseResult<()> {
    if !user_id_of(&msg).is_some_and(|id| state.is_allowed(id)) {
        warn!(chat_id = %msg.chat.id, "Rejected command from user not on the allow list");
        bot.send_message(msg.chat.id, NOT_ALLOWED).await?;
        return Ok(());
    }

    match cmd {
        Command::Start => handle_start(bot, msg, state).await,
        Command::Help => handle_help(bot, msg).await,
        Command::Status => handle_status(bot, msg, state).await,
        Command::Cancel => handle_cancel(bot, msg, state).await,
    }
}

/// Handle an inline keyboard tap.
pub async fn handle_callback(bot: Bot, q: CallbackQuery, state: Arc<BotState>) -> ResponseResult<()> {
    let user_id = q.from.id.0 as i64;

    if !state.is_allowed(user_id) {
        bot.answer_callback_query(q.id.clone()).text(NOT_ALLOWED).await?;
        return Ok(());
    }
    if state.rate_limited(user_id).await {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    }

    let Some(message) = q.regular_message() else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };
    let (chat_id, message_id) = (message.chat.id, message.id);

    let choice = match q.data.as_deref().map(Choice::parse) {
        Some(Ok(choice)) => choice,
        Some(Err(e)) => {
            warn!(user_id, error = %e, "Ignoring callback");
            bot.answer_callback_query(q.id.clone()).await?;
            return Ok(());
        }
        None => {
            bot.answer_callback_query(q.id.clone()).await?;
            return Ok(());
        }
    };

    // Answer first; launching may take a while.
    bot.answer_callback_query(q.id.clone()).await?;

    let (transition, dialogue) = state.apply_choice(user_id, choice).await;
    match transition {
        Transition::Show(step) => {
            edit_menu(&bot, chat_id, message_id, prompt_for(step, dialogue.draft()), step).await?;
        }
        Transition::Stale(step) => {
            // Re-show the current step in place of the outdated menu.
            let text = prompt_for(step, dialogue.draft());
            if edit_menu(&bot, chat_id, message_id, text.clone(), step).await.is_err() {
                send_menu(&bot, chat_id, text, step).await?;
            }
        }
        Transition::Launch(request) => {
            if let Err(e) = bot.delete_message(chat_id, message_id).await {
                warn!(chat_id = %chat_id, error = %e, "Failed to delete menu");
            }
            launch_report(bot, state, user_id, chat_id, request).await?;
        }
    }
    Ok(())
}

/// Handle a plain text message; only meaningful while entering a day count.
pub async fn handle_message(bot: Bot, msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let Some(user_id) = user_id_of(&msg) else {
        return Ok(());
    };
    if !state.is_allowed(user_id) {
        bot.send_message(msg.chat.id, NOT_ALLOWED).await?;
        return Ok(());
    }
    let Some(text) = msg.text() else {
        return Ok(());
    };

    if state.dialogue(user_id).await.step() != Step::Days {
        bot.send_message(msg.chat.id, "Use /start to create a report.")
            .await?;
        return Ok(());
    }

    match state.enter_days(user_id, text).await {
        Ok((Transition::Show(step), dialogue)) => {
            send_menu(&bot, msg.chat.id, prompt_for(step, dialogue.draft()), step).await?;
        }
        Ok(_) => {}
        Err(e) => {
            bot.send_message(msg.chat.id, e.to_string())
                .parse_mode(ParseMode::Html)
                .await?;
        }
    }
    Ok(())
}

/// First line of the progress note, depending on whether another scrape
/// holds the gate.
fn scrape_note(gate: &ScrapeGate) -> &'static str {
    if gate.is_busy() {
        "Another report is scraping right now; yours starts as soon as it finishes."
    } else {
        "Scraping channels."
    }
}

/// Registers the job and starts it in the background.
async fn launch_report(
    bot: Bot,
    state: Arc<BotState>,
    user_id: i64,
    chat_id: ChatId,
    request: LaunchRequest,
) -> ResponseResult<()> {
    if let Some(job_id) = state.active_job(user_id).await {
        bot.send_message(
            chat_id,
            format!(
                "<b>Your previous report is still running</b>\n\n\
                Job <code>{}</code>. Wait for it to finish or use /cancel.",
                html_escape(&job_id)
            ),
        )
        .parse_mode(ParseMode::Html)
        .reply_markup(restart_keyboard())
        .await?;
        return Ok(());
    }

    let job_id = state.pipeline().job_id(user_id);
    let options = request.options;
    let status = bot
        .send_message(
            chat_id,
            format!(
                "<b>Report accepted</b>\n\n\
                <b>Report:</b> {}\n\
                <b>Period:</b> {}\n\
                <b>Model:</b> {}\n\
                <b>Provider:</b> {}\n\
                <b>Job:</b> <code>{}</code>\n\n\
                {} This usually takes 2-5 minutes; \
                the file will be sent here automatically.",
                options.report_type.display_name(),
                period_label(&request.period),
                options.model_alias.display_name(),
                options.provider_mode.display_name(),
                job_id,
                scrape_note(state.pipeline().fetcher().gate())
            ),
        )
        .parse_mode(ParseMode::Html)
        .await?;

    let task = run_report(
        bot.clone(),
        Arc::clone(&state),
        chat_id,
        status.id,
        job_id.clone(),
        request,
    );
    if !state.spawn_task(user_id, chat_id, job_id.clone(), task).await {
        warn!(user_id, job_id = %job_id, "Report already running, launch dropped");
        let _ = bot.delete_message(chat_id, status.id).await;
    }
    Ok(())
}

/// Runs the pipeline and delivers the document or a friendly error.
async fn run_report(
    bot: Bot,
    state: Arc<BotState>,
    chat_id: ChatId,
    status_message: MessageId,
    job_id: String,
    request: LaunchRequest,
) {
    let result = state
        .pipeline()
        .run(&job_id, request.period, request.options)
        .await;

    if let Err(e) = bot.delete_message(chat_id, status_message).await {
        warn!(job_id = %job_id, error = %e, "Failed to delete status message");
    }

    let sent = match result {
        Ok(output) => {
            let document = output.document;
            let size_kb = document.bytes.len() as f64 / 1024.0;
            let caption = format!(
                "<b>Report ready</b>\n\n\
                <b>File:</b> <code>{}</code>\n\
                <b>Size:</b> {:.1} KB\n\
                <b>Messages:</b> {}",
                html_escape(&document.filename),
                size_kb,
                output.message_count
            );
            bot.send_document(
                chat_id,
                InputFile::memory(document.bytes).file_name(document.filename),
            )
            .caption(caption)
            .parse_mode(ParseMode::Html)
            .reply_markup(restart_keyboard())
            .await
        }
        Err(e) => {
            bot.send_message(chat_id, friendly_error(&e))
                .parse_mode(ParseMode::Html)
                .reply_markup(restart_keyboard())
                .await
        }
    };

    match sent {
        Ok(_) => info!(job_id = %job_id, "Report delivered"),
        Err(e) => warn!(job_id = %job_id, error = %e, "Failed to deliver report"),
    }
}

/// User-facing text for a failed job.
pub fn friendly_error(err: &PipelineError) -> String {
    match err {
        PipelineError::NoMessages => "<b>No messages found</b>\n\n\
            The tracked channels published nothing in this period.\n\n\
            Try a longer period, another channel list, or try again later."
            .to_string(),
        PipelineError::Configuration(_) => "<b>Service is not configured</b>\n\n\
            The selected provider or channel list is unavailable. \
            Try the other provider or contact the administrator."
            .to_string(),
        e if e.to_string().to_lowercase().contains("timed out") => {
            "<b>The request timed out</b>\n\n\
            Try a shorter period or retry in a few minutes."
                .to_string()
        }
        e => {
            let text: String = e.to_string().chars().take(200).collect();
            format!(
                "<b>Report generation failed</b>\n\n<code>{}</code>\n\n\
                Try again in a few minutes or choose a shorter period.",
                html_escape(&text)
            )
        }
    }
}
