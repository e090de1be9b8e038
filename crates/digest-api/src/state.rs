//! Application state shared across handlers.

use std::sync::Arc;

use digest_core::{CycleReport, JobRegistry, Reclaimer, ReclaimerConfig};
use digest_persistence::RetentionSweeper;
use digest_pipeline::ReportPipeline;
use tokio::sync::watch;

use crate::config::ApiConfig;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// API configuration.
    pub config: Arc<ApiConfig>,
    /// Report pipeline; owns the fetcher and the job registry handle.
    pub pipeline: Arc<ReportPipeline>,
    /// On-demand reclamation over the pipeline's registry.
    pub reclaimer: Arc<Reclaimer>,
    /// Artifact retention sweeper.
    pub sweeper: Arc<RetentionSweeper>,
    /// Latest cycle of the background reclaimer, if one runs.
    pub reclaim_cycles: watch::Receiver<Option<CycleReport>>,
}

impl AppState {
    /// Creates a new AppState.
    pub fn new(
        config: ApiConfig,
        pipeline: ReportPipeline,
        reclaimer_config: ReclaimerConfig,
        sweeper: Arc<RetentionSweeper>,
    ) -> Self {
        let reclaimer = Reclaimer::new(Arc::clone(pipeline.registry()), reclaimer_config);
        let reclaim_cycles = reclaimer.cycle_reports();
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            reclaimer: Arc::new(reclaimer),
            sweeper,
            reclaim_cycles,
        }
    }

    /// Reports cycles of the background reclaimer in `/admin/memory-stats`.
    pub fn with_reclaim_cycles(mut self, cycles: watch::Receiver<Option<CycleReport>>) -> Self {
        self.reclaim_cycles = cycles;
        self
    }

    /// The job registry.
    pub fn registry(&self) -> &Arc<JobRegistry> {
        self.pipeline.registry()
    }
}
