//! Request option resolution shared by the HTTP and chat surfaces.

use chrono::DateTime;
use digest_models::{ChannelSource, ModelAlias, Period, ProviderMode, ReportType};
use serde::Serialize;
use tracing::warn;

use crate::error::{PipelineError, Result};

/// Fully resolved report options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub struct ReportOptions {
    pub report_type: ReportType,
    pub model_alias: ModelAlias,
    pub provider_mode: ProviderMode,
    pub channel_source: ChannelSource,
}

impl ReportOptions {
    pub fn new(report_type: ReportType) -> Self {
        Self {
            report_type,
            ..Self::default()
        }
    }

    pub fn with_model_alias(mut self, alias: ModelAlias) -> Self {
        self.model_alias = alias;
        self
    }

    pub fn with_provider_mode(mut self, mode: ProviderMode) -> Self {
        self.provider_mode = mode;
        self
    }

    pub fn with_channel_source(mut self, source: ChannelSource) -> Self {
        self.channel_source = source;
        self
    }

    /// Resolves raw request strings.
    ///
    /// `report_type` is mandatory and strict. The other options fall back
    /// to their defaults with a warning when unknown.
    pub fn resolve(
        report_type: Option<&str>,
        model_alias: Option<&str>,
        provider_mode: Option<&str>,
        channel_source: Option<&str>,
    ) -> Result<Self> {
        Ok(Self {
            report_type: parse_report_type(report_type)?,
            model_alias: lenient(model_alias),
            provider_mode: lenient(provider_mode),
            channel_source: lenient(channel_source),
        })
    }
}

/// Parses a mandatory report type, listing valid values on failure.
pub fn parse_report_type(value: Option<&str>) -> Result<ReportType> {
    let value = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| PipelineError::InvalidRequest("report_type is required".to_string()))?;

    value.parse().map_err(|_| {
        let valid: Vec<&str> = ReportType::ALL.iter().map(|t| t.as_str()).collect();
        PipelineError::InvalidRequest(format!(
            "unknown report type: {}. Available: {}",
            value,
            valid.join(", ")
        ))
    })
}

/// Parses a channel source, falling back to `source_1` when unknown.
pub fn channel_source_or_default(value: Option<&str>) -> ChannelSource {
    lenient(value)
}

fn lenient<T>(value: Option<&str>) -> T
where
    T: std::str::FromStr<Err = digest_models::UnknownOption> + Default + std::fmt::Display,
{
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => T::default(),
        Some(v) => v.parse().unwrap_or_else(|e| {
            let fallback = T::default();
            warn!(error = %e, fallback = %fallback, "unknown option, using default");
            fallback
        }),
    }
}

/// Resolves the requested window.
///
/// An explicit `start`/`end` pair wins, then the `period` keyword, then
/// `days`.
pub fn resolve_period(
    days: Option<u32>,
    period: Option<&str>,
    start: Option<&str>,
    end: Option<&str>,
) -> Result<Period> {
    if let (Some(start), Some(end)) = (start, end) {
        let parse = |field: &str, value: &str| {
            DateTime::parse_from_rfc3339(value.trim()).map_err(|e| {
                PipelineError::InvalidRequest(format!("invalid {}: {}", field, e))
            })
        };
        let start = parse("start_date", start)?;
        let end = parse("end_date", end)?;
        if start >= end {
            return Err(PipelineError::InvalidRequest(
                "start_date must be before end_date".to_string(),
            ));
        }
        return Ok(Period::Range { start, end });
    }

    if let Some(keyword) = period.map(str::trim).filter(|p| !p.is_empty()) {
        return Ok(Period::from_keyword(keyword)?);
    }

    match days {
        Some(days) => Ok(Period::days(days)?),
        None => Err(PipelineError::InvalidRequest(
            "either days or period is required".to_string(),
        )),
    }
}
