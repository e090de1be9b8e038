//! Response DTOs for the API.

use chrono::{DateTime, FixedOffset, Utc};
use digest_core::{CycleReport, ProcessMemory, RegistryStats, SystemMemory, WorkingSetEstimate};
use digest_models::{JobStatus, MessageRecord};
use digest_persistence::{ArtifactInfo, DirStats};
use serde::Serialize;
use serde_json::Value;

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// GET / response.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub endpoints: Vec<&'static str>,
}

/// Scraped messages of a window.
#[derive(Debug, Clone, Serialize)]
pub struct ParseResponse {
    pub success: bool,
    pub start_date: DateTime<FixedOffset>,
    pub end_date: DateTime<FixedOffset>,
    pub total_messages: usize,
    pub messages: Vec<MessageRecord>,
}

/// Persisted artifact of a window.
#[derive(Debug, Clone, Serialize)]
pub struct ParseAndSaveResponse {
    pub success: bool,
    pub output_file: String,
    pub from_cache: bool,
    pub total_messages: usize,
    pub start_date: DateTime<FixedOffset>,
    pub end_date: DateTime<FixedOffset>,
}

/// Stored artifacts by directory.
#[derive(Debug, Clone, Serialize)]
pub struct ListFilesResponse {
    pub raw_parses_files: Vec<ArtifactInfo>,
    pub temp_files: Vec<ArtifactInfo>,
}

/// One selectable option.
#[derive(Debug, Clone, Serialize)]
pub struct OptionInfo {
    pub id: &'static str,
    pub name: String,
}

/// Available report options.
#[derive(Debug, Clone, Serialize)]
pub struct ReportTypesResponse {
    pub report_types: Vec<OptionInfo>,
    pub models: Vec<OptionInfo>,
    pub provider_modes: Vec<OptionInfo>,
    pub channel_sources: Vec<OptionInfo>,
}

/// Registry counters plus the latest background reclaim cycle.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryStatsResponse {
    #[serde(flatten)]
    pub registry: RegistryStats,
    pub last_cycle: Option<CycleReport>,
}

/// Process and system memory, including the page cache.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryDetailedResponse {
    pub process: Option<ProcessMemory>,
    pub system: Option<SystemMemory>,
    pub working_set_estimate: Option<WorkingSetEstimate>,
}

/// Artifact directory sizes.
#[derive(Debug, Clone, Serialize)]
pub struct DiskUsageResponse {
    pub raw_parses: DirStats,
    pub temp: DirStats,
    pub total_files: usize,
    pub total_mb: f64,
}

/// Job status lookup.
#[derive(Debug, Clone, Serialize)]
pub struct JobResponse {
    pub id: String,
    pub status: JobStatus,
    pub expires_at: Option<DateTime<Utc>>,
    /// Payload with large fields left out.
    pub details: Value,
}
