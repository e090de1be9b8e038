//! Message cards and prompt files.

use std::path::Path;

use chrono::NaiveDate;
use digest_models::{MessageRecord, ReportType};

use crate::error::{ReportError, Result};

/// Placeholder in prompt files replaced with the report date.
pub const REPORT_DATE_PLACEHOLDER: &str = "[REPORT_DATE]";

const CARD_SEPARATOR: &str = "\n\n\n";

/// Renders one message as a delimited card.
fn card(message: &MessageRecord) -> String {
    format!(
        "--- MESSAGE START ---\n\
         Source: {}\n\
         Date: {}\n\
         Message ID: {}\n\n\
         {}\n\
         --- MESSAGE END ---",
        message.channel_name,
        message.publication_date.to_rfc3339(),
        message.message_id,
        message.text.trim()
    )
}

/// Joins every message with text into the model input.
///
/// Messages with blank text are skipped; `ReportError::NoMessages` when
/// none remain.
pub fn prepare_message_text(messages: &[MessageRecord]) -> Result<String> {
    let cards: Vec<String> = messages.iter().filter(|m| m.has_text()).map(card).collect();
    if cards.is_empty() {
        return Err(ReportError::NoMessages);
    }
    Ok(cards.join(CARD_SEPARATOR))
}

/// Reads `<prompts_dir>/<type>.md` and fills in the report date.
pub async fn load_prompt(
    prompts_dir: &Path,
    report_type: ReportType,
    report_date: NaiveDate,
) -> Result<String> {
    let path = prompts_dir.join(report_type.prompt_file());
    let prompt = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| ReportError::Prompt {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(ReportError::Prompt {
            path: path.display().to_string(),
            reason: "file is empty".to_string(),
        });
    }

    Ok(prompt.replace(
        REPORT_DATE_PLACEHOLDER,
        &report_date.format("%Y-%m-%d").to_string(),
    ))
}
