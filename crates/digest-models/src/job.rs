//! Job lifecycle states.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default retention of a finished job.
pub const COMPLETED_TTL: Duration = Duration::from_secs(300);

/// Default retention of a failed job.
pub const ERROR_TTL: Duration = Duration::from_secs(300);

/// Status of a job tracked by the registry.
///
/// `Pending` and `Processing` are protected: a job in either state has no
/// expiry and only explicit removal deletes it. `Completed` and `Error`
/// carry a TTL after which the reclaimer may evict them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Admitted, not started yet.
    #[default]
    Pending,
    /// Work in progress.
    Processing,
    /// Finished successfully.
    Completed,
    /// Finished with a failure.
    Error,
}

impl JobStatus {
    /// Returns the default TTL for this status, or `None` if it never expires.
    pub fn default_ttl(&self) -> Option<Duration> {
        match self {
            JobStatus::Pending | JobStatus::Processing => None,
            JobStatus::Completed => Some(COMPLETED_TTL),
            JobStatus::Error => Some(ERROR_TTL),
        }
    }

    /// Whether time-based reclamation may evict a job in this status.
    pub fn is_evictable(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }

    /// Returns the wire name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
