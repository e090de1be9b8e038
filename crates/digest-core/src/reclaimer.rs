//! Periodic memory reclamation.
//!
//! The reclaimer evicts expired jobs from the registry, severs their large
//! payload fields so the memory is dropped promptly, and asks the
//! allocator to return freed pages to the OS.
//!
//! Two pass strengths exist:
//! - light: heap trim only, used when nothing was evicted
//! - full: registry storage compaction followed by a heap trim
//!
//! The background loop runs on a fixed interval and forces a full pass on
//! every `deep_every`-th cycle regardless of eviction outcome. A panicking
//! cycle is logged and the loop carries on; the outcome of each completed
//! cycle is published through [`Reclaimer::cycle_reports`].

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::error::{CoreError, Result};
use crate::memory::{bytes_to_mb, process_memory, trim_heap};
use crate::registry::JobRegistry;

/// Payload fields known to hold bulk data.
pub const LARGE_PAYLOAD_FIELDS: [&str; 4] = ["file_content", "telegram_text", "messages", "report_data"];

/// Reclaimer configuration.
#[derive(Debug, Clone)]
pub struct ReclaimerConfig {
    /// Time between reclaim cycles.
    pub interval: Duration,
    /// Every n-th cycle also runs a full pass.
    pub deep_every: u32,
}

impl Default for ReclaimerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(120),
            deep_every: 5,
        }
    }
}

impl ReclaimerConfig {
    /// Creates a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cycle interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the full-pass cadence. Zero disables forced full passes.
    pub fn with_deep_every(mut self, cycles: u32) -> Self {
        self.deep_every = cycles;
        self
    }
}

/// Strength of a reclamation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassKind {
    Light,
    Full,
}

/// Outcome of a reclamation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReclaimReport {
    /// Jobs evicted.
    pub evicted: usize,
    /// Estimated bytes held by severed payload fields.
    pub released_bytes: u64,
    /// Pass strength that ran.
    pub pass: PassKind,
    /// Whether the allocator reported returning memory.
    pub heap_trimmed: bool,
    pub rss_before_mb: Option<f64>,
    pub rss_after_mb: Option<f64>,
}

impl ReclaimReport {
    /// Estimated released payload size in MiB.
    pub fn released_mb(&self) -> f64 {
        bytes_to_mb(self.released_bytes)
    }
}

/// Outcome of one background loop cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    /// 1-based cycle number since the loop started.
    pub cycle: u64,
    /// Whether this was a scheduled deep cycle.
    pub deep: bool,
    #[serde(flatten)]
    pub report: ReclaimReport,
}

/// Evicts expired jobs and trims the heap, on demand or on a schedule.
pub struct Reclaimer {
    registry: Arc<JobRegistry>,
    config: ReclaimerConfig,
    handle: Option<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    cycles_tx: watch::Sender<Option<CycleReport>>,
}

impl Reclaimer {
    /// Creates a reclaimer bound to `registry`. The loop is not started.
    pub fn new(registry: Arc<JobRegistry>, config: ReclaimerConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (cycles_tx, _) = watch::channel(None);
        Self {
            registry,
            config,
            handle: None,
            shutdown_tx,
            shutdown_rx,
            cycles_tx,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ReclaimerConfig {
        &self.config
    }

    /// Latest completed background cycle; `None` until the first one ends.
    pub fn cycle_reports(&self) -> watch::Receiver<Option<CycleReport>> {
        self.cycles_tx.subscribe()
    }

    /// Evicts every expired job and runs the matching pass.
    ///
    /// Large payload fields are taken out under the registry lock; sizing
    /// and dropping them, compaction and the heap trim all happen after the
    /// lock is released.
    pub async fn reclaim_expired(&self) -> ReclaimReport {
        reclaim_expired(&self.registry).await
    }

    /// One `reclaim_expired` followed by an unconditional full pass.
    pub async fn force_reclaim_now(&self) -> ReclaimReport {
        force_reclaim(&self.registry).await
    }

    /// Spawns the background loop.
    pub fn start(&mut self) -> Result<()> {
        if self.handle.is_some() {
            return Err(CoreError::AlreadyStarted("reclaimer"));
        }

        let registry = Arc::clone(&self.registry);
        let config = self.config.clone();
        let shutdown_rx = self.shutdown_rx.clone();
        let cycles_tx = self.cycles_tx.clone();

        self.handle = Some(tokio::spawn(async move {
            reclaim_loop(registry, config, shutdown_rx, cycles_tx).await;
        }));

        Ok(())
    }

    /// Whether the background loop is running.
    pub fn is_started(&self) -> bool {
        self.handle.is_some()
    }

    /// Stops the background loop; it performs a final reclaim before exiting.
    pub async fn shutdown(&mut self) -> Result<()> {
        let handle = self.handle.take().ok_or(CoreError::NotStarted("reclaimer"))?;

        self.shutdown_tx
            .send(true)
            .map_err(|e| CoreError::Shutdown(format!("failed to signal reclaimer: {}", e)))?;

        handle
            .await
            .map_err(|e| CoreError::Shutdown(format!("reclaimer task panicked: {}", e)))
    }
}

impl Drop for Reclaimer {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let _ = self.shutdown_tx.send(true);
        }
    }
}

/// Runs reclaim cycles until the shutdown signal flips to `true`.
async fn reclaim_loop(
    registry: Arc<JobRegistry>,
    config: ReclaimerConfig,
    mut shutdown: watch::Receiver<bool>,
    cycles: watch::Sender<Option<CycleReport>>,
) {
    let mut ticker = interval_at(Instant::now() + config.interval, config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut cycle: u64 = 0;

    info!(
        interval_secs = config.interval.as_secs(),
        deep_every = config.deep_every,
        "memory reclaimer started"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                cycle += 1;
                let deep = is_deep_cycle(cycle, config.deep_every);
                let iteration = AssertUnwindSafe(run_cycle(&registry, deep)).catch_unwind();
                match iteration.await {
                    Ok(report) => {
                        cycles.send_replace(Some(CycleReport { cycle, deep, report }));
                    }
                    Err(_) => error!(cycle, "reclaim cycle panicked, continuing"),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    debug!("reclaimer received shutdown signal");
                    break;
                }
            }
        }
    }

    let report = reclaim_expired(&registry).await;
    info!(evicted = report.evicted, "final reclaim before shutdown");
}

/// Whether cycle number `cycle` (1-based) also runs a full pass.
fn is_deep_cycle(cycle: u64, deep_every: u32) -> bool {
    deep_every > 0 && cycle % u64::from(deep_every) == 0
}

async fn run_cycle(registry: &JobRegistry, deep: bool) -> ReclaimReport {
    let mut report = reclaim_expired(registry).await;
    if deep && report.pass == PassKind::Light {
        report.heap_trimmed = full_pass(registry).await || report.heap_trimmed;
        report.pass = PassKind::Full;
        report.rss_after_mb = current_rss_mb();
        info!(
            heap_trimmed = report.heap_trimmed,
            rss_before_mb = ?report.rss_before_mb,
            rss_after_mb = ?report.rss_after_mb,
            "deep reclaim pass"
        );
    }
    report
}

async fn reclaim_expired(registry: &JobRegistry) -> ReclaimReport {
    let rss_before = current_rss_mb();
    let now = registry.clock().now();

    let severed: Vec<(String, Vec<Value>)> = {
        let mut entries = registry.lock().await;
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(id, _)| id.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|id| {
                let mut entry = entries.remove(&id)?;
                Some((id, sever_large_fields(&mut entry.payload)))
            })
            .collect()
    };

    let evicted = severed.len();
    let released_bytes: u64 = severed
        .iter()
        .flat_map(|(_, values)| values.iter())
        .map(estimate_size)
        .sum();
    for (id, _) in &severed {
        debug!(job_id = %id, "expired job reclaimed");
    }
    drop(severed);

    let (pass, heap_trimmed) = if evicted > 0 {
        (PassKind::Full, full_pass(registry).await)
    } else {
        (PassKind::Light, trim_heap())
    };

    let report = ReclaimReport {
        evicted,
        released_bytes,
        pass,
        heap_trimmed,
        rss_before_mb: rss_before,
        rss_after_mb: current_rss_mb(),
    };

    if evicted > 0 {
        info!(
            evicted,
            released_mb = report.released_mb(),
            heap_trimmed,
            rss_before_mb = ?report.rss_before_mb,
            rss_after_mb = ?report.rss_after_mb,
            "expired jobs reclaimed"
        );
    } else {
        debug!(heap_trimmed, "light reclaim pass");
    }

    report
}

async fn force_reclaim(registry: &JobRegistry) -> ReclaimReport {
    let rss_before = current_rss_mb();
    let mut report = reclaim_expired(registry).await;
    report.heap_trimmed = full_pass(registry).await || report.heap_trimmed;
    report.pass = PassKind::Full;
    report.rss_before_mb = rss_before;
    report.rss_after_mb = current_rss_mb();
    info!(
        evicted = report.evicted,
        rss_before_mb = ?report.rss_before_mb,
        rss_after_mb = ?report.rss_after_mb,
        "forced full reclaim"
    );
    report
}

async fn full_pass(registry: &JobRegistry) -> bool {
    registry.lock().await.shrink_to_fit();
    trim_heap()
}

/// Takes the well-known bulk fields out of an object payload.
fn sever_large_fields(payload: &mut Value) -> Vec<Value> {
    let mut severed = Vec::new();
    if let Value::Object(map) = payload {
        for key in LARGE_PAYLOAD_FIELDS {
            if let Some(value) = map.get_mut(key) {
                severed.push(value.take());
            }
        }
    }
    severed.push(payload.take());
    severed
}

/// Rough in-memory size of a JSON value.
fn estimate_size(value: &Value) -> u64 {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) => 8,
        Value::String(s) => s.len() as u64,
        Value::Array(items) => items.iter().map(estimate_size).sum::<u64>() + 24,
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| k.len() as u64 + estimate_size(v))
            .sum::<u64>()
            + 48,
    }
}

fn current_rss_mb() -> Option<f64> {
    process_memory().map(|m| m.rss_mb())
}
