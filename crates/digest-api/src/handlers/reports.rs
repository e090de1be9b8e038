//! Report handlers.

use axum::{
    extract::State,
    http::{header, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use digest_models::{ChannelSource, ModelAlias, ProviderMode, ReportType};
use digest_report::RenderedDocument;
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::state::AppState;
use crate::types::{
    GenerateFromFileRequest, GenerateRequest, OptionInfo, ParseAndGenerateRequest,
    ReportTypesResponse,
};

/// Header carrying the registry job id of a pipeline run.
pub const JOB_ID_HEADER: &str = "x-job-id";

fn document_response(document: RenderedDocument, job_id: Option<&str>) -> Result<Response> {
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        document.filename
    ))
    .map_err(|e| ApiError::Internal(e.to_string()))?;

    let mut response = (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(document.content_type)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        document.bytes,
    )
        .into_response();

    if let Some(id) = job_id {
        let value = HeaderValue::from_str(id).map_err(|e| ApiError::Internal(e.to_string()))?;
        response
            .headers_mut()
            .insert(HeaderName::from_static(JOB_ID_HEADER), value);
    }
    Ok(response)
}

/// POST /api/reports/generate - Report from messages in the request body.
pub async fn generate(
    State(state): State<AppState>,
    Json(req): Json<GenerateRequest>,
) -> Result<Response> {
    let messages = req
        .messages
        .filter(|m| !m.is_empty())
        .ok_or_else(|| ApiError::BadRequest("messages is required".to_string()))?;
    let options = req.report.resolve()?;

    let report = state.pipeline.generate_document(messages, &options).await?;
    document_response(report.document, None)
}

/// POST /api/reports/generate-from-file - Report from a stored artifact.
pub async fn generate_from_file(
    State(state): State<AppState>,
    Json(req): Json<GenerateFromFileRequest>,
) -> Result<Response> {
    let key = req
        .source_file
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ApiError::BadRequest("source_file is required".to_string()))?
        .to_string();
    let options = req.report.resolve()?;

    let messages = state.pipeline.fetcher().load(&key).await?;
    info!(key = %key, count = messages.len(), "generating report from artifact");

    let report = state.pipeline.generate_document(messages, &options).await?;
    document_response(report.document, None)
}

/// POST /api/reports/parse-and-generate - Full pipeline in one request.
pub async fn parse_and_generate(
    State(state): State<AppState>,
    Json(req): Json<ParseAndGenerateRequest>,
) -> Result<Response> {
    let options = req.report.resolve()?;
    let period = req.window.resolve()?;
    let job_id = format!("api_{}", Uuid::new_v4().simple());

    info!(
        job_id = %job_id,
        period = %period.label(),
        report_type = %options.report_type,
        model = %options.model_alias,
        provider = %options.provider_mode,
        source = %options.channel_source,
        "report requested"
    );

    let output = state.pipeline.run(&job_id, period, options).await?;
    document_response(output.document, Some(&job_id))
}

/// GET /api/reports/types - Selectable report options.
pub async fn report_types() -> Json<ReportTypesResponse> {
    Json(ReportTypesResponse {
        report_types: ReportType::ALL
            .iter()
            .map(|t| OptionInfo {
                id: t.as_str(),
                name: t.display_name().to_string(),
            })
            .collect(),
        models: ModelAlias::ALL
            .iter()
            .map(|m| OptionInfo {
                id: m.as_str(),
                name: m.display_name().to_string(),
            })
            .collect(),
        provider_modes: ProviderMode::ALL
            .iter()
            .map(|p| OptionInfo {
                id: p.as_str(),
                name: p.display_name().to_string(),
            })
            .collect(),
        channel_sources: ChannelSource::ALL
            .iter()
            .map(|s| OptionInfo {
                id: s.as_str(),
                name: format!("Source {}", s.number()),
            })
            .collect(),
    })
}
