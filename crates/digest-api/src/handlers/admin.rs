//! Administrative handlers and the admin token guard.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
    Json,
};
use digest_core::{
    process_memory, sweep_blocking, system_memory, ReclaimReport, WorkingSetEstimate,
};
use digest_persistence::{DirStats, SweepReport, RAW_PARSES_DIR, TEMP_DIR};
use tracing::{info, warn};

use crate::error::{ApiError, Result};
use crate::state::AppState;
use crate::types::{DiskUsageResponse, MemoryDetailedResponse, MemoryStatsResponse};

/// Largest artifacts listed per directory by `/admin/disk-usage`.
pub const DISK_USAGE_TOP: usize = 10;

/// Header carrying the admin token.
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Rejects requests without the configured admin token. Open when no
/// token is configured.
pub async fn require_admin_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response> {
    if let Some(expected) = state.config.admin_token.as_deref() {
        let provided = request
            .headers()
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok());
        if provided != Some(expected) {
            warn!(path = %request.uri().path(), "admin request rejected");
            return Err(ApiError::Unauthorized("invalid admin token".to_string()));
        }
    }
    Ok(next.run(request).await)
}

/// GET /admin/memory-stats - Registry counters, process memory and the
/// latest background reclaim cycle.
pub async fn memory_stats(State(state): State<AppState>) -> Json<MemoryStatsResponse> {
    let last_cycle = state.reclaim_cycles.borrow().clone();
    Json(MemoryStatsResponse {
        registry: state.registry().stats().await,
        last_cycle,
    })
}

/// GET /admin/memory-detailed - Process memory next to the kernel page
/// cache and buffers.
pub async fn memory_detailed() -> Json<MemoryDetailedResponse> {
    let process = process_memory();
    let system = system_memory();
    let working_set_estimate = system
        .as_ref()
        .map(|system| WorkingSetEstimate::new(process.as_ref(), system));
    Json(MemoryDetailedResponse {
        process,
        system,
        working_set_estimate,
    })
}

/// GET /admin/disk-usage - Artifact directory sizes and largest files.
pub async fn disk_usage(State(state): State<AppState>) -> Result<Json<DiskUsageResponse>> {
    let store = Arc::clone(state.pipeline.fetcher().store());
    let (raw_parses, temp) = tokio::task::spawn_blocking(move || {
        Ok::<(DirStats, DirStats), digest_persistence::PersistenceError>((
            store.dir_stats(RAW_PARSES_DIR, DISK_USAGE_TOP)?,
            store.dir_stats(TEMP_DIR, DISK_USAGE_TOP)?,
        ))
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))?
    .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(DiskUsageResponse {
        total_files: raw_parses.file_count + temp.file_count,
        total_mb: ((raw_parses.total_mb + temp.total_mb) * 100.0).round() / 100.0,
        raw_parses,
        temp,
    }))
}

/// POST /admin/memory-cleanup - Evict expired jobs now.
pub async fn memory_cleanup(State(state): State<AppState>) -> Json<ReclaimReport> {
    let report = state.reclaimer.reclaim_expired().await;
    info!(evicted = report.evicted, "manual reclaim");
    Json(report)
}

/// POST /admin/force-gc - Evict expired jobs and run a full pass.
pub async fn force_gc(State(state): State<AppState>) -> Json<ReclaimReport> {
    let report = state.reclaimer.force_reclaim_now().await;
    info!(evicted = report.evicted, heap_trimmed = report.heap_trimmed, "forced reclaim");
    Json(report)
}

/// POST /admin/file-cleanup - Run one retention sweep.
pub async fn file_cleanup(State(state): State<AppState>) -> Result<Json<SweepReport>> {
    let report = sweep_blocking(Arc::clone(&state.sweeper)).await?;
    info!(deleted = report.deleted_count, freed_mb = report.freed_mb(), "manual retention sweep");
    Ok(Json(report))
}
