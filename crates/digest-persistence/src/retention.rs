//! Retention sweeper for stale scrape artifacts.
//!
//! Only `raw_parses/` is ever swept. The live cache under `temp/` and the
//! scraper session files are protected, and any candidate path resolving
//! outside the sweep root is rejected and logged rather than deleted.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Offset, TimeZone, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::store::{RAW_PARSES_DIR, TEMP_DIR};

/// Default name of the scraper session file under the data root.
pub const SESSION_FILE: &str = "telegram_parser_session";

/// Retention sweep configuration.
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    /// Data root holding `raw_parses/` and `temp/`.
    pub data_root: PathBuf,
    /// Artifacts older than this many days are deleted.
    pub retention_days: u32,
    /// Local hour (0-23) at which the daily sweep runs.
    pub run_hour: u32,
    /// Local offset used to place `run_hour`.
    pub offset: FixedOffset,
    /// Paths that must never be touched, in addition to the defaults.
    pub extra_forbidden: Vec<PathBuf>,
}

impl RetentionConfig {
    /// Creates a config with defaults: 7 days, 03:00 at UTC+3.
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            retention_days: 7,
            run_hour: 3,
            offset: FixedOffset::east_opt(3 * 3600).unwrap_or_else(|| Utc.fix()),
            extra_forbidden: Vec::new(),
        }
    }

    /// Sets the retention threshold in days.
    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    /// Sets the local run hour, clamped to 0-23.
    pub fn with_run_hour(mut self, hour: u32) -> Self {
        self.run_hour = hour.min(23);
        self
    }

    /// Sets the local offset.
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    /// Adds a protected path.
    pub fn with_forbidden(mut self, path: impl Into<PathBuf>) -> Self {
        self.extra_forbidden.push(path.into());
        self
    }
}

/// A deleted artifact.
#[derive(Debug, Clone, Serialize)]
pub struct DeletedFile {
    pub path: String,
    pub size_bytes: u64,
    pub modified: DateTime<Utc>,
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub deleted_count: usize,
    pub freed_bytes: u64,
    pub deleted_files: Vec<DeletedFile>,
    pub rejected: Vec<String>,
    pub errors: Vec<String>,
}

impl SweepReport {
    /// Freed space in MiB, rounded to two decimals.
    pub fn freed_mb(&self) -> f64 {
        (self.freed_bytes as f64 / 1024.0 / 1024.0 * 100.0).round() / 100.0
    }
}

/// Deletes stale artifacts under `raw_parses/`.
#[derive(Debug, Clone)]
pub struct RetentionSweeper {
    config: RetentionConfig,
    target: PathBuf,
    forbidden: Vec<PathBuf>,
}

impl RetentionSweeper {
    /// Creates a sweeper for the given configuration.
    pub fn new(config: RetentionConfig) -> Self {
        let root = normalize(&config.data_root);
        let target = root.join(RAW_PARSES_DIR);
        let mut forbidden = vec![root.join(TEMP_DIR), root.join(SESSION_FILE)];
        forbidden.extend(config.extra_forbidden.iter().map(|p| normalize(p)));
        Self {
            config,
            target,
            forbidden,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RetentionConfig {
        &self.config
    }

    /// Returns the normalized sweep root.
    pub fn target_dir(&self) -> &Path {
        &self.target
    }

    /// Whether `path` may be deleted. Rejections are logged.
    pub fn is_path_safe(&self, path: &Path) -> bool {
        let normalized = normalize(path);

        if !normalized.starts_with(&self.target) {
            warn!(path = %path.display(), "refusing to delete file outside retention root");
            return false;
        }

        if self.forbidden.iter().any(|f| normalized.starts_with(f)) {
            warn!(path = %path.display(), "refusing to delete file in protected path");
            return false;
        }

        true
    }

    /// Deletes every file under the sweep root last modified before
    /// `now - retention_days`.
    pub fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();

        if !self.target.is_dir() {
            warn!(dir = %self.target.display(), "retention root does not exist");
            report
                .errors
                .push(format!("directory not found: {}", self.target.display()));
            return report;
        }

        let cutoff = now - Duration::days(i64::from(self.config.retention_days));
        info!(
            dir = %self.target.display(),
            retention_days = self.config.retention_days,
            "starting retention sweep"
        );

        let mut pending = vec![self.target.clone()];
        while let Some(dir) = pending.pop() {
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    error!(dir = %dir.display(), error = %e, "failed to scan directory");
                    report.errors.push(format!("{}: {}", dir.display(), e));
                    continue;
                }
            };

            for entry in entries.flatten() {
                let path = entry.path();
                let meta = match fs::symlink_metadata(&path) {
                    Ok(meta) => meta,
                    Err(e) => {
                        report.errors.push(format!("{}: {}", path.display(), e));
                        continue;
                    }
                };

                if meta.is_dir() {
                    pending.push(path);
                    continue;
                }

                if !self.is_path_safe(&path) {
                    report.rejected.push(path.display().to_string());
                    continue;
                }

                let modified = match meta.modified() {
                    Ok(m) => DateTime::<Utc>::from(m),
                    Err(e) => {
                        report.errors.push(format!("{}: {}", path.display(), e));
                        continue;
                    }
                };

                if modified >= cutoff {
                    continue;
                }

                match fs::remove_file(&path) {
                    Ok(()) => {
                        info!(path = %path.display(), size_bytes = meta.len(), "deleted stale artifact");
                        report.deleted_count += 1;
                        report.freed_bytes += meta.len();
                        report.deleted_files.push(DeletedFile {
                            path: path.display().to_string(),
                            size_bytes: meta.len(),
                            modified,
                        });
                    }
                    Err(e) => {
                        error!(path = %path.display(), error = %e, "failed to delete artifact");
                        report.errors.push(format!("{}: {}", path.display(), e));
                    }
                }
            }
        }

        info!(
            deleted = report.deleted_count,
            freed_mb = report.freed_mb(),
            "retention sweep finished"
        );
        report
    }

    /// Time from `now` until the next local `run_hour:00`.
    pub fn next_run_delay(&self, now: DateTime<Utc>) -> StdDuration {
        let local = now.with_timezone(&self.config.offset);
        let run_time = NaiveTime::from_hms_opt(self.config.run_hour, 0, 0).unwrap_or(NaiveTime::MIN);
        let today_run = self
            .config
            .offset
            .from_local_datetime(&local.date_naive().and_time(run_time))
            .single();

        let next = match today_run {
            Some(t) if t > local => t,
            Some(t) => t + Duration::days(1),
            None => local + Duration::days(1),
        };

        (next - local).to_std().unwrap_or(StdDuration::from_secs(24 * 3600))
    }
}

/// Lexically normalizes a path, resolving `.` and `..` without touching
/// the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
