//! Parser handlers.

use axum::{extract::State, Json};
use digest_persistence::{RAW_PARSES_DIR, TEMP_DIR};
use digest_pipeline::channel_source_or_default;
use tracing::info;

use crate::error::{ApiError, Result};
use crate::state::AppState;
use crate::types::{ListFilesResponse, ParseAndSaveResponse, ParseRequest, ParseResponse};

/// POST /api/parser/parse - Scrape a window and return its messages.
pub async fn parse(
    State(state): State<AppState>,
    Json(req): Json<ParseRequest>,
) -> Result<Json<ParseResponse>> {
    let period = req.window.resolve()?;
    let window = state.pipeline.window(period)?;
    let source = channel_source_or_default(req.channel_source.as_deref());

    info!(period = %period.label(), source = %source, "parse requested");
    let messages = state
        .pipeline
        .fetcher()
        .scrape_uncached(&window, source)
        .await?;

    Ok(Json(ParseResponse {
        success: true,
        start_date: window.start,
        end_date: window.end,
        total_messages: messages.len(),
        messages,
    }))
}

/// POST /api/parser/parse-and-save - Scrape through the cache and persist.
pub async fn parse_and_save(
    State(state): State<AppState>,
    Json(req): Json<ParseRequest>,
) -> Result<Json<ParseAndSaveResponse>> {
    let period = req.window.resolve()?;
    let window = state.pipeline.window(period)?;
    let source = channel_source_or_default(req.channel_source.as_deref());

    let outcome = state.pipeline.fetcher().fetch(&window, source).await?;

    Ok(Json(ParseAndSaveResponse {
        success: true,
        output_file: outcome.key,
        from_cache: outcome.from_cache,
        total_messages: outcome.messages.len(),
        start_date: window.start,
        end_date: window.end,
    }))
}

/// GET /api/parser/list-files - Stored artifacts, for diagnostics.
pub async fn list_files(State(state): State<AppState>) -> Result<Json<ListFilesResponse>> {
    let store = std::sync::Arc::clone(state.pipeline.fetcher().store());
    let (raw_parses_files, temp_files) = tokio::task::spawn_blocking(move || {
        Ok::<_, digest_persistence::PersistenceError>((
            store.list(RAW_PARSES_DIR)?,
            store.list(TEMP_DIR)?,
        ))
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))?
    .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(ListFilesResponse {
        raw_parses_files,
        temp_files,
    }))
}
