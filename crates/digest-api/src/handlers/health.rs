//! Service info and health check handlers.

use axum::{extract::State, Json};

use crate::state::AppState;
use crate::types::{HealthResponse, ServiceInfo};

/// GET / - Service description.
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: "channel-digest",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: vec![
            "/health",
            "/api/parser/parse",
            "/api/parser/parse-and-save",
            "/api/parser/list-files",
            "/api/reports/generate",
            "/api/reports/generate-from-file",
            "/api/reports/parse-and-generate",
            "/api/reports/types",
            "/api/jobs/:id",
            "/admin/memory-stats",
            "/admin/memory-detailed",
            "/admin/disk-usage",
            "/admin/memory-cleanup",
            "/admin/force-gc",
            "/admin/file-cleanup",
        ],
    })
}

/// GET /health - Health check endpoint.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.config.uptime_seconds(),
    })
}
