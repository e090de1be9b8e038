//! Wiring for the digest server binary.

use std::sync::Arc;

use digest_core::{AppConfig, CachePolicy, JobRegistry, ScrapeGate, SystemClock};
use digest_persistence::FsArtifactStore;
use digest_pipeline::{ChannelScraper, HttpBridgeClient, MessageFetcher, ReportPipeline};
use digest_report::{MarkdownRenderer, ProviderSettings, ReportGenerator};

/// Log filter for a `-v` count.
pub fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "digest=info,teloxide=warn,reqwest=warn,hyper=warn",
        1 => "digest=debug,teloxide=info,reqwest=warn,hyper=warn",
        2 => "digest=trace,teloxide=debug,reqwest=info,hyper=info",
        _ => "trace",
    }
}

/// LLM provider settings from the application config.
pub fn provider_settings(config: &AppConfig) -> ProviderSettings {
    ProviderSettings::new(&config.gemini_api_url, &config.polza_api_url)
        .with_google_api_key(config.google_api_key.clone())
        .with_polza_api_key(config.polza_api_key.clone())
}

/// Builds the report pipeline over the filesystem store and the scraper bridge.
pub fn build_pipeline(
    config: &AppConfig,
    registry: Arc<JobRegistry>,
) -> digest_pipeline::Result<ReportPipeline> {
    let offset = config.utc_offset();
    let bridge = HttpBridgeClient::new(config.scraper_bridge_url.clone())?;

    let fetcher = MessageFetcher::new(
        Arc::new(FsArtifactStore::new(&config.data_dir)),
        CachePolicy::new(config.today_cache_max_age),
        ScrapeGate::new(),
        Arc::new(ChannelScraper::new(bridge, &config.channels_dir)),
    );

    Ok(ReportPipeline::new(
        fetcher,
        ReportGenerator::new(&config.prompts_dir, offset),
        Arc::new(MarkdownRenderer),
        Arc::new(provider_settings(config)),
        registry,
        Arc::new(SystemClock),
        offset,
    ))
}
