//! Core data models for the channel digest platform.
//!
//! This crate provides the shared types used across every digest crate:
//! - `JobStatus` - lifecycle state of a tracked job, with its eviction TTL
//! - `MessageRecord` - one scraped channel message
//! - `Period` / `DateWindow` - the reporting window selection
//! - `ReportType`, `ProviderMode`, `ModelAlias`, `ChannelSource` - request options

pub mod job;
pub mod message;
pub mod options;
pub mod period;

pub use job::{JobStatus, COMPLETED_TTL, ERROR_TTL};
pub use message::MessageRecord;
pub use options::{ChannelSource, ModelAlias, ProviderMode, ReportType, UnknownOption};
pub use period::{DateWindow, Period, PeriodError, MAX_DAYS};
