//! Daily retention sweep as a background service.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use digest_persistence::{RetentionSweeper, SweepReport};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::{CoreError, Result};

/// Delay before retrying after a failed sweep.
const RETRY_DELAY: Duration = Duration::from_secs(3600);

/// Runs the retention sweeper once a day at its configured local hour.
pub struct RetentionService {
    sweeper: Arc<RetentionSweeper>,
    handle: Option<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl RetentionService {
    /// Creates a stopped service.
    pub fn new(sweeper: RetentionSweeper) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            sweeper: Arc::new(sweeper),
            handle: None,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Returns the sweeper.
    pub fn sweeper(&self) -> Arc<RetentionSweeper> {
        Arc::clone(&self.sweeper)
    }

    /// Spawns the daily loop.
    pub fn start(&mut self) -> Result<()> {
        if self.handle.is_some() {
            return Err(CoreError::AlreadyStarted("retention service"));
        }
        let sweeper = Arc::clone(&self.sweeper);
        let shutdown = self.shutdown_rx.clone();
        self.handle = Some(tokio::spawn(async move {
            retention_loop(sweeper, shutdown).await;
        }));
        Ok(())
    }

    /// Whether the loop is running.
    pub fn is_started(&self) -> bool {
        self.handle.is_some()
    }

    /// Stops the loop.
    pub async fn shutdown(&mut self) -> Result<()> {
        let handle = self
            .handle
            .take()
            .ok_or(CoreError::NotStarted("retention service"))?;
        self.shutdown_tx
            .send(true)
            .map_err(|e| CoreError::Shutdown(format!("failed to signal retention loop: {}", e)))?;
        handle
            .await
            .map_err(|e| CoreError::Shutdown(format!("retention task panicked: {}", e)))
    }
}

impl Drop for RetentionService {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let _ = self.shutdown_tx.send(true);
        }
    }
}

/// Runs one sweep of `sweeper` on the blocking pool.
pub async fn sweep_blocking(sweeper: Arc<RetentionSweeper>) -> Result<SweepReport> {
    tokio::task::spawn_blocking(move || sweeper.sweep(Utc::now()))
        .await
        .map_err(|e| CoreError::TaskFailed(format!("retention sweep: {}", e)))
}

async fn retention_loop(sweeper: Arc<RetentionSweeper>, mut shutdown: watch::Receiver<bool>) {
    let config = sweeper.config();
    info!(
        retention_days = config.retention_days,
        run_hour = config.run_hour,
        dir = %sweeper.target_dir().display(),
        "retention sweeper started"
    );

    let mut delay = sweeper.next_run_delay(Utc::now());
    loop {
        info!(next_run_in_mins = delay.as_secs() / 60, "next retention sweep scheduled");

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    debug!("retention loop received shutdown signal");
                    break;
                }
                continue;
            }
        }

        delay = match sweep_blocking(Arc::clone(&sweeper)).await {
            Ok(report) => {
                info!(
                    deleted = report.deleted_count,
                    freed_mb = report.freed_mb(),
                    errors = report.errors.len(),
                    "scheduled retention sweep done"
                );
                sweeper.next_run_delay(Utc::now())
            }
            Err(e) => {
                error!(error = %e, "retention sweep failed, retrying in an hour");
                RETRY_DELAY
            }
        };
    }

    info!("retention sweeper stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use digest_persistence::RetentionConfig;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_sweep_blocking() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("raw_parses")).unwrap();
        let service = RetentionService::new(RetentionSweeper::new(RetentionConfig::new(dir.path())));

        let report = sweep_blocking(service.sweeper()).await.unwrap();
        assert_eq!(report.deleted_count, 0);
        assert!(report.errors.is_empty());
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let dir = tempdir().unwrap();
        let mut service =
            RetentionService::new(RetentionSweeper::new(RetentionConfig::new(dir.path())));

        service.start().unwrap();
        assert!(service.is_started());
        assert!(service.start().is_err());

        service.shutdown().await.unwrap();
        assert!(!service.is_started());
    }
}
