//! Cache admission for persisted scrape artifacts.
//!
//! Historical windows are immutable once scraped, so any existing artifact
//! is reusable. The live `Today` window keeps growing; its artifact is
//! reused only while younger than `max_age`, measured from the artifact's
//! persisted modification time.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use digest_models::{ChannelSource, DateWindow, Period};
use digest_persistence::{ArtifactStore, RAW_PARSES_DIR, TEMP_DIR};
use serde::Serialize;
use tracing::debug;

use crate::clock::{Clock, SystemClock};

/// Default maximum age of a reusable `Today` artifact.
pub const DEFAULT_TODAY_MAX_AGE: Duration = Duration::from_secs(300);

/// What admission knows about one artifact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheDescriptor {
    /// Artifact key in the store.
    pub key: String,
    /// Period the artifact covers; decides the freshness rule.
    pub period: Period,
    /// Observed modification time, `None` if the artifact is missing.
    pub modified: Option<DateTime<Utc>>,
}

/// Decides whether a persisted artifact may stand in for a fresh scrape.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    today_max_age: Duration,
    clock: Arc<dyn Clock>,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_TODAY_MAX_AGE)
    }
}

impl CachePolicy {
    /// Creates a policy with the given `Today` max age and the system clock.
    pub fn new(today_max_age: Duration) -> Self {
        Self::with_clock(today_max_age, Arc::new(SystemClock))
    }

    /// Creates a policy with an explicit clock.
    pub fn with_clock(today_max_age: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            today_max_age,
            clock,
        }
    }

    /// Returns the `Today` max age.
    pub fn today_max_age(&self) -> Duration {
        self.today_max_age
    }

    /// Reads the artifact's current state from `store`.
    pub fn describe(&self, store: &dyn ArtifactStore, key: &str, period: Period) -> CacheDescriptor {
        let modified = match store.modified_time(key) {
            Ok(modified) => modified,
            Err(e) => {
                debug!(key, error = %e, "artifact metadata unavailable, treating as missing");
                None
            }
        };
        CacheDescriptor {
            key: key.to_string(),
            period,
            modified,
        }
    }

    /// Whether the described artifact may be reused.
    pub fn should_use_cache(&self, descriptor: &CacheDescriptor) -> bool {
        let Some(modified) = descriptor.modified else {
            return false;
        };

        if !descriptor.period.is_live() {
            return true;
        }

        let age = self.clock.now() - modified;
        let max_age = chrono::Duration::from_std(self.today_max_age).unwrap_or(chrono::Duration::MAX);
        let fresh = age <= max_age;
        debug!(
            key = %descriptor.key,
            age_secs = age.num_seconds(),
            max_age_secs = self.today_max_age.as_secs(),
            fresh,
            "live artifact age checked"
        );
        fresh
    }

    /// `describe` followed by `should_use_cache`.
    pub fn admit(&self, store: &dyn ArtifactStore, key: &str, period: Period) -> bool {
        self.should_use_cache(&self.describe(store, key, period))
    }
}

/// Store key of the artifact for `window` scraped from `source`.
///
/// - `Today` maps to a single rolling file under `temp/`
/// - single-day windows are named by their start date
/// - longer windows are named `{start}_to_{end}`
pub fn cache_key(window: &DateWindow, source: ChannelSource) -> String {
    let suffix = source.artifact_suffix();
    let start = window.start.format("%Y-%m-%d");

    match window.period {
        Period::Today => format!("{}/today_cache{}.json", TEMP_DIR, suffix),
        Period::Yesterday => format!("{}/{}{}.json", RAW_PARSES_DIR, start, suffix),
        _ if window.spans_multiple_days() => format!(
            "{}/{}_to_{}{}.json",
            RAW_PARSES_DIR,
            start,
            window.end.format("%Y-%m-%d"),
            suffix
        ),
        _ => format!("{}/{}{}.json", RAW_PARSES_DIR, start, suffix),
    }
}
