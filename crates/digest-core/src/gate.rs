//! Process-wide scrape serialization.
//!
//! The scraping client keeps a single on-disk session that cannot be
//! opened twice, so at most one scrape runs at a time across the whole
//! process. Callers hold a `ScrapePermit` for the duration of the session;
//! dropping it, including on an error path, releases the gate.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Mutual-exclusion gate around scraping sessions.
#[derive(Debug, Clone, Default)]
pub struct ScrapeGate {
    inner: Arc<Mutex<()>>,
}

/// Proof of exclusive scrape access. Releases the gate on drop.
#[derive(Debug)]
pub struct ScrapePermit {
    _guard: OwnedMutexGuard<()>,
    acquired_at: Instant,
}

impl ScrapeGate {
    /// Creates an open gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access.
    pub async fn acquire(&self) -> ScrapePermit {
        let started = Instant::now();
        let guard = Arc::clone(&self.inner).lock_owned().await;
        let waited = started.elapsed();
        debug!(waited_ms = waited.as_millis() as u64, "scrape gate acquired");
        ScrapePermit {
            _guard: guard,
            acquired_at: Instant::now(),
        }
    }

    /// Whether a scrape currently holds the gate.
    pub fn is_busy(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}

impl Drop for ScrapePermit {
    fn drop(&mut self) {
        debug!(
            held_ms = self.acquired_at.elapsed().as_millis() as u64,
            "scrape gate released"
        );
    }
}
