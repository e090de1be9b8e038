//! JobRegistry - TTL-evicting map of in-flight and recently finished jobs.
//!
//! Every read and write goes through a single async mutex. The lock only
//! guards map access; callers receive cloned payloads, and memory
//! inspection happens after the lock is released.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use digest_models::JobStatus;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, trace};

use crate::clock::{Clock, SystemClock};
use crate::memory::process_memory;

/// Retention of jobs in evictable statuses.
///
/// Protected statuses (`Pending`, `Processing`) never expire regardless of
/// policy; only the terminal statuses are tunable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    pub completed: Duration,
    pub error: Duration,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            completed: digest_models::COMPLETED_TTL,
            error: digest_models::ERROR_TTL,
        }
    }
}

impl TtlPolicy {
    /// Uses the same TTL for both terminal statuses.
    pub fn uniform(ttl: Duration) -> Self {
        Self {
            completed: ttl,
            error: ttl,
        }
    }

    /// TTL for `status`, or `None` if it never expires.
    pub fn ttl_for(&self, status: JobStatus) -> Option<Duration> {
        match status {
            JobStatus::Pending | JobStatus::Processing => None,
            JobStatus::Completed => Some(self.completed),
            JobStatus::Error => Some(self.error),
        }
    }
}

/// A stored job.
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub(crate) payload: Value,
    pub(crate) status: JobStatus,
    pub(crate) expires_at: Option<DateTime<Utc>>,
}

impl Entry {
    /// Expired once `now` is strictly past the expiry.
    pub(crate) fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status.is_evictable() && self.expires_at.is_some_and(|at| at < now)
    }
}

/// Point-in-time copy of a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub id: String,
    pub status: JobStatus,
    pub payload: Value,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Registry counters plus process memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RegistryStats {
    /// Jobs currently held.
    pub active_jobs: usize,
    /// Jobs with an expiry.
    pub ttl_tracked: usize,
    /// Jobs per status.
    pub by_status: HashMap<JobStatus, usize>,
    /// Resident memory in MiB, if available.
    pub rss_mb: Option<f64>,
    /// Virtual memory in MiB, if available.
    pub vms_mb: Option<f64>,
}

/// Lock-serialized job store with lazy and reclaimer-driven eviction.
#[derive(Debug)]
pub struct JobRegistry {
    entries: Mutex<HashMap<String, Entry>>,
    ttl: TtlPolicy,
    clock: Arc<dyn Clock>,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRegistry {
    /// Creates a registry with the default TTLs and the system clock.
    pub fn new() -> Self {
        Self::with_policy(TtlPolicy::default(), Arc::new(SystemClock))
    }

    /// Creates a registry with a custom TTL policy and clock.
    pub fn with_policy(ttl: TtlPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    /// Returns the registry clock.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Inserts or replaces a job. A `None` payload removes it.
    ///
    /// Expiry is recomputed from `status` on every call.
    pub async fn put(&self, id: impl Into<String>, payload: Option<Value>, status: JobStatus) {
        let id = id.into();
        let Some(payload) = payload else {
            self.remove(&id).await;
            return;
        };

        let expires_at = self.expiry_for(status);
        let mut entries = self.entries.lock().await;
        entries.insert(
            id.clone(),
            Entry {
                payload,
                status,
                expires_at,
            },
        );
        drop(entries);

        debug!(job_id = %id, status = %status, expires_at = ?expires_at, "job stored");
    }

    /// Changes the status of an existing job, keeping its payload.
    ///
    /// Returns `false` if the job is unknown or already expired.
    pub async fn set_status(&self, id: &str, status: JobStatus) -> bool {
        let now = self.clock.now();
        let expires_at = self.expiry_for(status);
        let mut entries = self.entries.lock().await;

        let Some(entry) = live_entry(&mut entries, id, now) else {
            return false;
        };
        entry.status = status;
        entry.expires_at = expires_at;
        drop(entries);

        debug!(job_id = %id, status = %status, "job status changed");
        true
    }

    /// Returns the payload of a live job.
    ///
    /// An evictable job past its expiry is removed during the read and
    /// reported as missing.
    pub async fn get(&self, id: &str) -> Option<Value> {
        self.snapshot(id).await.map(|s| s.payload)
    }

    /// Returns the status of a live job, with the same eviction rule as `get`.
    pub async fn status(&self, id: &str) -> Option<JobStatus> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;
        live_entry(&mut entries, id, now).map(|e| e.status)
    }

    /// Returns a full copy of a live job.
    pub async fn snapshot(&self, id: &str) -> Option<JobSnapshot> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;
        live_entry(&mut entries, id, now).map(|e| JobSnapshot {
            id: id.to_string(),
            status: e.status,
            payload: e.payload.clone(),
            expires_at: e.expires_at,
        })
    }

    /// Removes a job unconditionally, whatever its status.
    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.entries.lock().await.remove(id).is_some();
        if removed {
            debug!(job_id = %id, "job removed");
        }
        removed
    }

    /// Number of stored jobs, including expired ones not yet reclaimed.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether the registry is empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Counters and process memory. Memory is read after the lock is released.
    pub async fn stats(&self) -> RegistryStats {
        let mut stats = {
            let entries = self.entries.lock().await;
            let mut by_status = HashMap::new();
            for entry in entries.values() {
                *by_status.entry(entry.status).or_insert(0) += 1;
            }
            RegistryStats {
                active_jobs: entries.len(),
                ttl_tracked: entries.values().filter(|e| e.expires_at.is_some()).count(),
                by_status,
                rss_mb: None,
                vms_mb: None,
            }
        };

        if let Some(mem) = process_memory() {
            stats.rss_mb = Some(mem.rss_mb());
            stats.vms_mb = Some(mem.vms_mb());
        }
        stats
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().await
    }

    fn expiry_for(&self, status: JobStatus) -> Option<DateTime<Utc>> {
        let ttl = self.ttl.ttl_for(status)?;
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        Some(self.clock.now().checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC))
    }
}

/// Looks up `id`, evicting it first if it has expired.
fn live_entry<'a>(
    entries: &'a mut HashMap<String, Entry>,
    id: &str,
    now: DateTime<Utc>,
) -> Option<&'a mut Entry> {
    if entries.get(id).is_some_and(|e| e.is_expired(now)) {
        entries.remove(id);
        trace!(job_id = %id, "expired job evicted on read");
        return None;
    }
    entries.get_mut(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use serde_json::json;

    fn make_registry(ttl: TtlPolicy) -> (JobRegistry, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let registry = JobRegistry::with_policy(ttl, clock.clone());
        (registry, clock)
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let (registry, _) = make_registry(TtlPolicy::default());

        registry
            .put("job-1", Some(json!({"step": "scrape"})), JobStatus::Processing)
            .await;

        assert_eq!(registry.get("job-1").await, Some(json!({"step": "scrape"})));
        assert_eq!(registry.status("job-1").await, Some(JobStatus::Processing));
    }

    #[tokio::test]
    async fn test_put_none_removes() {
        let (registry, _) = make_registry(TtlPolicy::default());
        registry.put("job-1", Some(json!(1)), JobStatus::Processing).await;

        registry.put("job-1", None, JobStatus::Processing).await;

        assert_eq!(registry.get("job-1").await, None);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_expired_terminal_job_invisible_on_read() {
        let (registry, clock) = make_registry(TtlPolicy::default());
        registry.put("job-1", Some(json!(1)), JobStatus::Completed).await;

        clock.advance(chrono::Duration::seconds(299));
        assert!(registry.get("job-1").await.is_some());

        clock.advance(chrono::Duration::seconds(2));
        assert_eq!(registry.get("job-1").await, None);
        // Lazy eviction removed it, not just hid it
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test]
    async fn test_job_kept_at_exact_expiry() {
        let (registry, clock) = make_registry(TtlPolicy::default());
        registry.put("u1_123", Some(json!(1)), JobStatus::Completed).await;

        clock.advance(chrono::Duration::seconds(300));
        assert_eq!(registry.get("u1_123").await, Some(json!(1)));

        clock.advance(chrono::Duration::milliseconds(1));
        assert_eq!(registry.get("u1_123").await, None);
    }

    #[tokio::test]
    async fn test_protected_jobs_never_expire_on_read() {
        let (registry, clock) = make_registry(TtlPolicy::uniform(Duration::ZERO));
        registry.put("a", Some(json!(1)), JobStatus::Pending).await;
        registry.put("b", Some(json!(2)), JobStatus::Processing).await;

        clock.advance(chrono::Duration::days(30));

        assert!(registry.get("a").await.is_some());
        assert!(registry.get("b").await.is_some());
    }

    #[tokio::test]
    async fn test_transition_recomputes_expiry() {
        let (registry, clock) = make_registry(TtlPolicy::default());
        registry.put("job-1", Some(json!(1)), JobStatus::Processing).await;
        assert_eq!(registry.snapshot("job-1").await.unwrap().expires_at, None);

        clock.advance(chrono::Duration::hours(2));
        assert!(registry.set_status("job-1", JobStatus::Error).await);

        let snap = registry.snapshot("job-1").await.unwrap();
        assert_eq!(snap.status, JobStatus::Error);
        assert_eq!(snap.payload, json!(1));
        assert_eq!(snap.expires_at, Some(clock.now() + chrono::Duration::seconds(300)));

        // Back to processing clears the expiry again
        assert!(registry.set_status("job-1", JobStatus::Processing).await);
        assert_eq!(registry.snapshot("job-1").await.unwrap().expires_at, None);
    }

    #[tokio::test]
    async fn test_set_status_unknown_job() {
        let (registry, _) = make_registry(TtlPolicy::default());
        assert!(!registry.set_status("missing", JobStatus::Completed).await);
    }

    #[tokio::test]
    async fn test_remove_ignores_status() {
        let (registry, _) = make_registry(TtlPolicy::default());
        registry.put("job-1", Some(json!(1)), JobStatus::Processing).await;

        assert!(registry.remove("job-1").await);
        assert!(!registry.remove("job-1").await);
    }

    #[tokio::test]
    async fn test_stats_counts() {
        let (registry, _) = make_registry(TtlPolicy::default());
        registry.put("a", Some(json!(1)), JobStatus::Processing).await;
        registry.put("b", Some(json!(2)), JobStatus::Completed).await;
        registry.put("c", Some(json!(3)), JobStatus::Error).await;

        let stats = registry.stats().await;
        assert_eq!(stats.active_jobs, 3);
        assert_eq!(stats.ttl_tracked, 2);
        assert_eq!(stats.by_status.get(&JobStatus::Processing), Some(&1));
        assert_eq!(stats.by_status.get(&JobStatus::Completed), Some(&1));
    }

    #[test]
    fn test_ttl_policy() {
        let policy = TtlPolicy::uniform(Duration::from_secs(10));
        assert_eq!(policy.ttl_for(JobStatus::Completed), Some(Duration::from_secs(10)));
        assert_eq!(policy.ttl_for(JobStatus::Processing), None);
        assert_eq!(
            TtlPolicy::default().ttl_for(JobStatus::Error),
            Some(Duration::from_secs(300))
        );
    }
}
