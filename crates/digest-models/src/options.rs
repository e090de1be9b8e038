//! Report request options.
//!
//! Each option parses strictly through `FromStr`; callers that accept
//! user input decide whether an unknown value is an error or falls back
//! to the default variant.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A string did not name a known option variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownOption {
    /// Option family, e.g. "report type".
    pub kind: &'static str,
    /// The rejected value.
    pub value: String,
}

impl UnknownOption {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Kind of digest to generate. Each maps to one prompt file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    /// News digest.
    #[default]
    News,
    /// Events calendar.
    Events,
    /// First custom scenario.
    CustomTask1,
    /// Second custom scenario.
    CustomTask2,
}

impl ReportType {
    /// All report types in display order.
    pub const ALL: [ReportType; 4] = [
        ReportType::News,
        ReportType::Events,
        ReportType::CustomTask1,
        ReportType::CustomTask2,
    ];

    /// Wire identifier, also the prompt file stem.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::News => "news",
            ReportType::Events => "events",
            ReportType::CustomTask1 => "custom_task_1",
            ReportType::CustomTask2 => "custom_task_2",
        }
    }

    /// Human readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            ReportType::News => "News digest",
            ReportType::Events => "Events calendar",
            ReportType::CustomTask1 => "Custom scenario",
            ReportType::CustomTask2 => "Custom scenario 2",
        }
    }

    /// Prompt file name for this report type.
    pub fn prompt_file(&self) -> String {
        format!("{}.md", self.as_str())
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportType {
    type Err = UnknownOption;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReportType::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| UnknownOption::new("report type", s))
    }
}

/// Which LLM backend pays for the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderMode {
    /// Google Gemini called directly.
    #[default]
    Free,
    /// Polza.ai OpenAI-compatible aggregator.
    Paid,
}

impl ProviderMode {
    /// All provider modes.
    pub const ALL: [ProviderMode; 2] = [ProviderMode::Free, ProviderMode::Paid];

    /// Wire identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderMode::Free => "free",
            ProviderMode::Paid => "paid",
        }
    }

    /// Human readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderMode::Free => "Free (Google Gemini)",
            ProviderMode::Paid => "Paid (Polza.ai)",
        }
    }
}

impl fmt::Display for ProviderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderMode {
    type Err = UnknownOption;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "free" => Ok(ProviderMode::Free),
            "paid" => Ok(ProviderMode::Paid),
            other => Err(UnknownOption::new("provider mode", other)),
        }
    }
}

/// Short model alias resolved per provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ModelAlias {
    /// Gemini 2.5 Flash.
    #[default]
    #[serde(rename = "flash_2_5")]
    Flash25,
    /// Gemini 3.0 Flash preview.
    #[serde(rename = "flash_3_0")]
    Flash30,
}

impl ModelAlias {
    /// All model aliases.
    pub const ALL: [ModelAlias; 2] = [ModelAlias::Flash25, ModelAlias::Flash30];

    /// Wire identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelAlias::Flash25 => "flash_2_5",
            ModelAlias::Flash30 => "flash_3_0",
        }
    }

    /// Human readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelAlias::Flash25 => "Gemini 2.5 Flash",
            ModelAlias::Flash30 => "Gemini 3.0 Flash",
        }
    }

    /// Model id understood by the Google API.
    pub fn google_model(&self) -> &'static str {
        match self {
            ModelAlias::Flash25 => "gemini-2.5-flash",
            ModelAlias::Flash30 => "gemini-3-flash-preview",
        }
    }

    /// Model id understood by the Polza API.
    pub fn polza_model(&self) -> &'static str {
        match self {
            ModelAlias::Flash25 => "google/gemini-2.5-flash",
            ModelAlias::Flash30 => "google/gemini-3-flash-preview",
        }
    }

    /// Model id for the given provider mode.
    pub fn model_for(&self, mode: ProviderMode) -> &'static str {
        match mode {
            ProviderMode::Free => self.google_model(),
            ProviderMode::Paid => self.polza_model(),
        }
    }
}

impl fmt::Display for ModelAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelAlias {
    type Err = UnknownOption;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "flash_2_5" => Ok(ModelAlias::Flash25),
            "flash_3_0" => Ok(ModelAlias::Flash30),
            other => Err(UnknownOption::new("model alias", other)),
        }
    }
}

/// Channel list a scrape draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ChannelSource {
    #[default]
    #[serde(rename = "source_1")]
    Source1,
    #[serde(rename = "source_2")]
    Source2,
    #[serde(rename = "source_3")]
    Source3,
    #[serde(rename = "source_4")]
    Source4,
    #[serde(rename = "source_5")]
    Source5,
    #[serde(rename = "source_6")]
    Source6,
}

impl ChannelSource {
    /// All channel sources.
    pub const ALL: [ChannelSource; 6] = [
        ChannelSource::Source1,
        ChannelSource::Source2,
        ChannelSource::Source3,
        ChannelSource::Source4,
        ChannelSource::Source5,
        ChannelSource::Source6,
    ];

    /// Wire identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelSource::Source1 => "source_1",
            ChannelSource::Source2 => "source_2",
            ChannelSource::Source3 => "source_3",
            ChannelSource::Source4 => "source_4",
            ChannelSource::Source5 => "source_5",
            ChannelSource::Source6 => "source_6",
        }
    }

    /// 1-based position of the source, used for display.
    pub fn number(&self) -> usize {
        match self {
            ChannelSource::Source1 => 1,
            ChannelSource::Source2 => 2,
            ChannelSource::Source3 => 3,
            ChannelSource::Source4 => 4,
            ChannelSource::Source5 => 5,
            ChannelSource::Source6 => 6,
        }
    }

    /// File holding the channel list for this source.
    pub fn channels_file(&self) -> String {
        format!("{}.json", self.as_str())
    }

    /// Suffix appended to artifact names. `source_1` has none so
    /// artifacts written before sources existed keep their names.
    pub fn artifact_suffix(&self) -> String {
        match self {
            ChannelSource::Source1 => String::new(),
            other => format!("_{}", other.as_str()),
        }
    }
}

impl fmt::Display for ChannelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelSource {
    type Err = UnknownOption;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChannelSource::ALL
            .into_iter()
            .find(|c| c.as_str() == s.trim())
            .ok_or_else(|| UnknownOption::new("channel source", s))
    }
}
