//! Job status handler.

use axum::{
    extract::{Path, State},
    Json,
};
use digest_core::LARGE_PAYLOAD_FIELDS;
use serde_json::Value;

use crate::error::{ApiError, Result};
use crate::state::AppState;
use crate::types::JobResponse;

/// GET /api/jobs/:id - Status of a live job. Expired jobs are not found.
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobResponse>> {
    let snapshot = state
        .registry()
        .snapshot(&id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("job {}", id)))?;

    let details = match snapshot.payload {
        Value::Object(mut map) => {
            for field in LARGE_PAYLOAD_FIELDS {
                map.remove(field);
            }
            Value::Object(map)
        }
        other => other,
    };

    Ok(Json(JobResponse {
        id: snapshot.id,
        status: snapshot.status,
        expires_at: snapshot.expires_at,
        details,
    }))
}
