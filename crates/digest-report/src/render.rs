//! Document rendering.

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::NaiveDate;
use digest_models::ReportType;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ReportError, Result};
use crate::generator::GENERATION_DATE_FIELD;

/// Fields tried in order for an item heading.
const TITLE_FIELDS: [&str; 4] = ["title", "headline", "name", "event"];

/// Turns report data into a downloadable document.
pub trait DocumentRenderer: Send + Sync {
    /// MIME type of the produced bytes.
    fn content_type(&self) -> &'static str;

    /// File extension without the dot.
    fn extension(&self) -> &'static str;

    /// Renders `data` for `report_type`.
    fn render(&self, data: &Map<String, Value>, report_type: ReportType) -> Result<Vec<u8>>;
}

/// A rendered report ready to send.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedDocument {
    pub filename: String,
    pub content_type: &'static str,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl RenderedDocument {
    /// Renders on the blocking pool and names the file for `date`.
    pub async fn render(
        renderer: Arc<dyn DocumentRenderer>,
        data: Map<String, Value>,
        report_type: ReportType,
        date: NaiveDate,
    ) -> Result<Self> {
        let content_type = renderer.content_type();
        let filename = report_filename(report_type, date, renderer.extension());

        let bytes = tokio::task::spawn_blocking(move || renderer.render(&data, report_type))
            .await
            .map_err(|e| ReportError::Render(format!("render task failed: {}", e)))??;

        debug!(filename = %filename, bytes = bytes.len(), "document rendered");
        Ok(Self {
            filename,
            content_type,
            bytes,
        })
    }
}

/// `report_{type}_{YYYY-MM-DD}.{ext}`
pub fn report_filename(report_type: ReportType, date: NaiveDate, extension: &str) -> String {
    format!(
        "report_{}_{}.{}",
        report_type.as_str(),
        date.format("%Y-%m-%d"),
        extension
    )
}

/// Renders report data as Markdown.
///
/// Scalar top-level fields become a header block; arrays of objects become
/// sections with one numbered entry per object.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

impl DocumentRenderer for MarkdownRenderer {
    fn content_type(&self) -> &'static str {
        "text/markdown; charset=utf-8"
    }

    fn extension(&self) -> &'static str {
        "md"
    }

    fn render(&self, data: &Map<String, Value>, report_type: ReportType) -> Result<Vec<u8>> {
        let mut out = String::new();
        write_document(&mut out, data, report_type)
            .map_err(|e| ReportError::Render(e.to_string()))?;
        Ok(out.into_bytes())
    }
}

fn write_document(
    out: &mut String,
    data: &Map<String, Value>,
    report_type: ReportType,
) -> std::fmt::Result {
    let title = data
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or_else(|| report_type.display_name());
    writeln!(out, "# {}\n", title)?;

    if let Some(date) = data.get(GENERATION_DATE_FIELD).and_then(Value::as_str) {
        writeln!(out, "_Generated: {}_\n", date)?;
    }

    for (key, value) in data {
        if key == "title" || key == GENERATION_DATE_FIELD {
            continue;
        }
        match value {
            Value::Array(entries) => {
                writeln!(out, "## {}\n", humanize(key))?;
                if entries.is_empty() {
                    writeln!(out, "_Nothing to report._\n")?;
                }
                for (index, entry) in entries.iter().enumerate() {
                    write_entry(out, index + 1, entry)?;
                }
            }
            Value::Object(fields) => {
                writeln!(out, "## {}\n", humanize(key))?;
                write_fields(out, fields, &[])?;
                writeln!(out)?;
            }
            Value::Null => {}
            scalar => writeln!(out, "**{}**: {}\n", humanize(key), inline(scalar))?,
        }
    }
    Ok(())
}

fn write_entry(out: &mut String, number: usize, entry: &Value) -> std::fmt::Result {
    let Value::Object(fields) = entry else {
        return writeln!(out, "{}. {}\n", number, inline(entry));
    };

    let title_key = TITLE_FIELDS
        .iter()
        .copied()
        .find(|k| fields.get(*k).and_then(Value::as_str).is_some());

    match title_key.and_then(|k| fields.get(k)).and_then(Value::as_str) {
        Some(title) => writeln!(out, "### {}. {}\n", number, title)?,
        None => writeln!(out, "### {}.\n", number)?,
    }
    write_fields(out, fields, title_key.as_slice())?;
    writeln!(out)
}

fn write_fields(out: &mut String, fields: &Map<String, Value>, skip: &[&str]) -> std::fmt::Result {
    for (key, value) in fields {
        if skip.contains(&key.as_str()) || value.is_null() {
            continue;
        }
        writeln!(out, "- **{}**: {}", humanize(key), inline(value))?;
    }
    Ok(())
}

fn inline(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items.iter().map(inline).collect::<Vec<_>>().join(", "),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{}: {}", humanize(k), inline(v)))
            .collect::<Vec<_>>()
            .join("; "),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn humanize(key: &str) -> String {
    let spaced = key.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
