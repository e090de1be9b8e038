//! Request DTOs for the API.

use digest_models::{MessageRecord, Period};
use digest_pipeline::{resolve_period, ReportOptions, Result};
use serde::Deserialize;

/// Window selection shared by the parser and report requests.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WindowSelection {
    /// Rolling window of N whole days.
    pub days: Option<u32>,
    /// `today` or `yesterday`.
    pub period: Option<String>,
    /// Explicit RFC 3339 start, used with `end_date`.
    pub start_date: Option<String>,
    /// Explicit RFC 3339 end, used with `start_date`.
    pub end_date: Option<String>,
}

impl WindowSelection {
    pub fn resolve(&self) -> Result<Period> {
        resolve_period(
            self.days,
            self.period.as_deref(),
            self.start_date.as_deref(),
            self.end_date.as_deref(),
        )
    }
}

/// POST /api/parser/parse and /api/parser/parse-and-save
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParseRequest {
    #[serde(flatten)]
    pub window: WindowSelection,
    pub channel_source: Option<String>,
}

/// Options naming the report to produce.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportSelection {
    pub report_type: Option<String>,
    pub model_alias: Option<String>,
    pub provider_mode: Option<String>,
    pub channel_source: Option<String>,
}

impl ReportSelection {
    pub fn resolve(&self) -> Result<ReportOptions> {
        ReportOptions::resolve(
            self.report_type.as_deref(),
            self.model_alias.as_deref(),
            self.provider_mode.as_deref(),
            self.channel_source.as_deref(),
        )
    }
}

/// POST /api/reports/generate
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateRequest {
    pub messages: Option<Vec<MessageRecord>>,
    #[serde(flatten)]
    pub report: ReportSelection,
}

/// POST /api/reports/generate-from-file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateFromFileRequest {
    /// Artifact key relative to the data root, e.g. `raw_parses/2025-03-09.json`.
    pub source_file: Option<String>,
    #[serde(flatten)]
    pub report: ReportSelection,
}

/// POST /api/reports/parse-and-generate
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParseAndGenerateRequest {
    #[serde(flatten)]
    pub window: WindowSelection,
    #[serde(flatten)]
    pub report: ReportSelection,
}
