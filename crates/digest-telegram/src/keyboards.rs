//! Menu text and inline keyboards for each dialogue step.

use digest_models::{ChannelSource, ModelAlias, Period, ProviderMode, ReportType};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::dialogue::{Choice, Draft, Nav, PeriodChoice, Step};

fn button(label: impl Into<String>, choice: Choice) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(label, choice.data())
}

fn nav_row(back: bool) -> Vec<InlineKeyboardButton> {
    let mut row = Vec::new();
    if back {
        row.push(button("Back", Choice::Nav(Nav::Back)));
    }
    row.push(button("Start over", Choice::Nav(Nav::Reset)));
    row
}

/// Keyboard for `step`.
pub fn keyboard_for(step: Step) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = match step {
        Step::Provider => ProviderMode::ALL
            .iter()
            .map(|&m| vec![button(m.display_name(), Choice::Mode(m))])
            .collect(),
        Step::Source => ChannelSource::ALL
            .iter()
            .map(|&s| vec![button(format!("Source {}", s.number()), Choice::Source(s))])
            .collect(),
        Step::ReportType => ReportType::ALL
            .iter()
            .map(|&t| vec![button(t.display_name(), Choice::Type(t))])
            .collect(),
        Step::Period => vec![
            vec![button("Today", Choice::Period(PeriodChoice::Today))],
            vec![button("Yesterday", Choice::Period(PeriodChoice::Yesterday))],
            vec![
                button("3 days", Choice::Period(PeriodChoice::Days(3))),
                button("7 days", Choice::Period(PeriodChoice::Days(7))),
            ],
            vec![button("Enter manually", Choice::Period(PeriodChoice::Manual))],
        ],
        Step::Days => Vec::new(),
        Step::Model => ModelAlias::ALL
            .iter()
            .map(|&m| vec![button(m.display_name(), Choice::Model(m))])
            .collect(),
    };
    rows.push(nav_row(step != Step::Provider));
    InlineKeyboardMarkup::new(rows)
}

/// Keyboard attached to finished reports and failures.
pub fn restart_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![button("New report", Choice::Nav(Nav::Start))]])
}

/// Human label of a period.
pub fn period_label(period: &Period) -> String {
    match period {
        Period::Today => "today".to_string(),
        Period::Yesterday => "yesterday".to_string(),
        Period::Days { days: 1 } => "the last day".to_string(),
        Period::Days { days } => format!("the last {} days", days),
        other => other.label(),
    }
}

/// HTML menu text for `step`, echoing what has been chosen so far.
pub fn prompt_for(step: Step, draft: &Draft) -> String {
    let mut summary = String::new();
    if let Some(mode) = draft.provider_mode.filter(|_| step != Step::Provider) {
        summary.push_str(&format!("<b>Provider:</b> {}\n", mode.display_name()));
    }
    if let Some(source) = draft
        .channel_source
        .filter(|_| !matches!(step, Step::Provider | Step::Source))
    {
        summary.push_str(&format!("<b>Channels:</b> Source {}\n", source.number()));
    }
    if let Some(report_type) = draft
        .report_type
        .filter(|_| matches!(step, Step::Period | Step::Days | Step::Model))
    {
        summary.push_str(&format!("<b>Report:</b> {}\n", report_type.display_name()));
    }
    if let Some(period) = draft.period.filter(|_| step == Step::Model) {
        summary.push_str(&format!("<b>Period:</b> {}\n", period_label(&period)));
    }
    if !summary.is_empty() {
        summary.push('\n');
    }

    let question = match step {
        Step::Provider => "Choose how reports are generated:".to_string(),
        Step::Source => "Choose a channel list:".to_string(),
        Step::ReportType => "Choose a report type:".to_string(),
        Step::Period => "Choose the period to scrape:".to_string(),
        Step::Days => format!(
            "<b>Send the number of days to scrape</b>\n\n\
            Scraping more than 3 days can take a long time.\n\n\
            Range: 1 to {}",
            digest_models::MAX_DAYS
        ),
        Step::Model => "Choose a model:".to_string(),
    };

    summary + &question
}
