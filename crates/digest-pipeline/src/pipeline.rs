//! End-to-end report orchestration.

use std::sync::Arc;

use chrono::{FixedOffset, NaiveDate};
use digest_core::{Clock, JobRegistry};
use digest_models::{DateWindow, JobStatus, MessageRecord, Period};
use digest_report::{DocumentRenderer, ProviderFactory, RenderedDocument, ReportGenerator};
use serde_json::{json, Map, Value};
use tracing::{error, info};

use crate::error::{PipelineError, Result};
use crate::fetch::{FetchOutcome, MessageFetcher};
use crate::request::ReportOptions;

/// A generated report and the data it was rendered from.
#[derive(Debug, Clone)]
pub struct GeneratedReport {
    pub document: RenderedDocument,
    pub data: Map<String, Value>,
}

/// Result of a full `fetch -> digest -> render` run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub document: RenderedDocument,
    pub window: DateWindow,
    pub cache_key: String,
    pub from_cache: bool,
    pub message_count: usize,
}

/// Wires fetching, the LLM step and rendering, recording job progress in
/// the registry.
#[derive(Clone)]
pub struct ReportPipeline {
    fetcher: MessageFetcher,
    generator: ReportGenerator,
    renderer: Arc<dyn DocumentRenderer>,
    providers: Arc<dyn ProviderFactory>,
    registry: Arc<JobRegistry>,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
}

impl ReportPipeline {
    pub fn new(
        fetcher: MessageFetcher,
        generator: ReportGenerator,
        renderer: Arc<dyn DocumentRenderer>,
        providers: Arc<dyn ProviderFactory>,
        registry: Arc<JobRegistry>,
        clock: Arc<dyn Clock>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            fetcher,
            generator,
            renderer,
            providers,
            registry,
            clock,
            offset,
        }
    }

    pub fn fetcher(&self) -> &MessageFetcher {
        &self.fetcher
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Job id for a request made by `owner` now: `{owner}_{unix_seconds}`.
    pub fn job_id(&self, owner: impl std::fmt::Display) -> String {
        format!("{}_{}", owner, self.clock.now().timestamp())
    }

    /// Local date used to name and date reports.
    pub fn today(&self) -> NaiveDate {
        self.clock.now().with_timezone(&self.offset).date_naive()
    }

    /// Resolves `period` against the pipeline clock.
    pub fn window(&self, period: Period) -> Result<DateWindow> {
        Ok(period.window(self.clock.now(), self.offset)?)
    }

    /// Fetches the messages of `period`, through the cache.
    pub async fn fetch(&self, period: Period, options: &ReportOptions) -> Result<FetchOutcome> {
        let window = self.window(period)?;
        self.fetcher.fetch(&window, options.channel_source).await
    }

    /// Runs the LLM step and renders the result.
    pub async fn generate_document(
        &self,
        messages: Vec<MessageRecord>,
        options: &ReportOptions,
    ) -> Result<GeneratedReport> {
        let provider = self
            .providers
            .provider(options.provider_mode, options.model_alias)?;
        let today = self.today();

        let data = self
            .generator
            .generate_on(provider.as_ref(), messages, options.report_type, today)
            .await?;

        let document =
            RenderedDocument::render(Arc::clone(&self.renderer), data.clone(), options.report_type, today)
                .await?;

        Ok(GeneratedReport { document, data })
    }

    /// Runs the whole pipeline as job `job_id`.
    ///
    /// The job is `processing` while running and ends `completed` or
    /// `error`, both of which the reclaimer evicts after their TTL.
    pub async fn run(
        &self,
        job_id: &str,
        period: Period,
        options: ReportOptions,
    ) -> Result<PipelineOutput> {
        self.registry
            .put(
                job_id,
                Some(json!({
                    "stage": "fetching",
                    "report_type": options.report_type,
                    "period": period.label(),
                    "channel_source": options.channel_source,
                })),
                JobStatus::Processing,
            )
            .await;

        match self.run_job(job_id, period, &options).await {
            Ok((output, data)) => {
                info!(
                    job_id,
                    filename = %output.document.filename,
                    messages = output.message_count,
                    from_cache = output.from_cache,
                    "report job completed"
                );
                self.registry
                    .put(
                        job_id,
                        Some(json!({
                            "stage": "done",
                            "report_type": options.report_type,
                            "filename": output.document.filename,
                            "cache_key": output.cache_key,
                            "message_count": output.message_count,
                            "report_data": data,
                        })),
                        JobStatus::Completed,
                    )
                    .await;
                Ok(output)
            }
            Err(e) => {
                error!(job_id, error = %e, "report job failed");
                self.registry
                    .put(
                        job_id,
                        Some(json!({ "stage": "failed", "error": e.to_string() })),
                        JobStatus::Error,
                    )
                    .await;
                Err(e)
            }
        }
    }

    async fn run_job(
        &self,
        job_id: &str,
        period: Period,
        options: &ReportOptions,
    ) -> Result<(PipelineOutput, Map<String, Value>)> {
        let window = self.window(period)?;
        let outcome = self.fetcher.fetch(&window, options.channel_source).await?;
        if outcome.messages.is_empty() {
            return Err(PipelineError::NoMessages);
        }

        let message_count = outcome.messages.len();
        self.registry
            .put(
                job_id,
                Some(json!({
                    "stage": "generating",
                    "report_type": options.report_type,
                    "cache_key": outcome.key,
                    "message_count": message_count,
                })),
                JobStatus::Processing,
            )
            .await;

        let FetchOutcome {
            key,
            from_cache,
            messages,
        } = outcome;
        let report = self.generate_document(messages, options).await?;

        Ok((
            PipelineOutput {
                document: report.document,
                window,
                cache_key: key,
                from_cache,
                message_count,
            },
            report.data,
        ))
    }
}
