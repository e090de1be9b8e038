//! Cache-aware message fetching.
//!
//! Every fresh scrape runs inside the process-wide `ScrapeGate`. Admission
//! is checked twice: once before queueing on the gate so cache hits never
//! wait, and again after acquiring it so a request that queued behind an
//! identical scrape reuses that scrape's artifact.

use std::sync::Arc;

use digest_core::{cache_key, CachePolicy, ScrapeGate};
use digest_models::{ChannelSource, DateWindow, MessageRecord};
use digest_persistence::{ArtifactStore, PersistenceError};
use serde::Serialize;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::scraper::ScrapeProvider;

/// Messages of one window plus where they came from.
#[derive(Debug, Clone, Serialize)]
pub struct FetchOutcome {
    /// Artifact key the messages are persisted under.
    pub key: String,
    /// Whether an existing artifact was reused.
    pub from_cache: bool,
    pub messages: Vec<MessageRecord>,
}

/// Loads messages from the artifact cache or scrapes them.
#[derive(Clone)]
pub struct MessageFetcher {
    store: Arc<dyn ArtifactStore>,
    policy: CachePolicy,
    gate: ScrapeGate,
    scraper: Arc<dyn ScrapeProvider>,
}

impl MessageFetcher {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        policy: CachePolicy,
        gate: ScrapeGate,
        scraper: Arc<dyn ScrapeProvider>,
    ) -> Self {
        Self {
            store,
            policy,
            gate,
            scraper,
        }
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    pub fn gate(&self) -> &ScrapeGate {
        &self.gate
    }

    /// Returns the window's messages, scraping and persisting on a miss.
    pub async fn fetch(&self, window: &DateWindow, source: ChannelSource) -> Result<FetchOutcome> {
        let key = cache_key(window, source);

        if self.policy.admit(self.store.as_ref(), &key, window.period) {
            let messages = self.load(&key).await?;
            info!(key = %key, count = messages.len(), "using cached artifact");
            return Ok(FetchOutcome {
                key,
                from_cache: true,
                messages,
            });
        }

        let _permit = self.gate.acquire().await;

        if self.policy.admit(self.store.as_ref(), &key, window.period) {
            let messages = self.load(&key).await?;
            info!(key = %key, count = messages.len(), "using artifact written while waiting");
            return Ok(FetchOutcome {
                key,
                from_cache: true,
                messages,
            });
        }

        info!(key = %key, period = %window.period.label(), "no usable artifact, scraping");
        let messages = self.scraper.scrape(window, source).await?;
        self.save(&key, &messages).await?;
        info!(key = %key, count = messages.len(), "artifact saved");

        Ok(FetchOutcome {
            key,
            from_cache: false,
            messages,
        })
    }

    /// Scrapes without touching the cache. Still serialized by the gate.
    pub async fn scrape_uncached(
        &self,
        window: &DateWindow,
        source: ChannelSource,
    ) -> Result<Vec<MessageRecord>> {
        let _permit = self.gate.acquire().await;
        self.scraper.scrape(window, source).await
    }

    /// Reads and decodes an artifact on the blocking pool.
    pub async fn load(&self, key: &str) -> Result<Vec<MessageRecord>> {
        let store = Arc::clone(&self.store);
        let key = key.to_string();
        tokio::task::spawn_blocking(move || -> Result<Vec<MessageRecord>> {
            let bytes = store.read(&key).map_err(|e| match e {
                PersistenceError::NotFound(key) => PipelineError::NotFound(key),
                e => PipelineError::Storage(e),
            })?;
            Ok(serde_json::from_slice(&bytes)?)
        })
        .await
        .map_err(|e| PipelineError::TaskFailed(format!("artifact load: {}", e)))?
    }

    async fn save(&self, key: &str, messages: &[MessageRecord]) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(messages)?;
        let store = Arc::clone(&self.store);
        let key = key.to_string();
        tokio::task::spawn_blocking(move || store.write(&key, &bytes))
            .await
            .map_err(|e| PipelineError::TaskFailed(format!("artifact save: {}", e)))??;
        Ok(())
    }
}
