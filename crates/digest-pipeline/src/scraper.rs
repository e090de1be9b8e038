//! Channel scraping.
//!
//! `ScrapeProvider` is the seam the pipeline depends on. The shipped
//! implementation is `ChannelScraper`, which reads a source's channel list
//! and fetches every channel concurrently over one `ChannelClient` session.

use std::path::PathBuf;

use async_trait::async_trait;
use digest_models::{ChannelSource, DateWindow, MessageRecord};
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};

/// Anything that can produce the messages of a window.
///
/// Unreachable or private channels contribute zero messages; only
/// configuration and session failures are errors.
#[async_trait]
pub trait ScrapeProvider: Send + Sync {
    async fn scrape(&self, window: &DateWindow, source: ChannelSource) -> Result<Vec<MessageRecord>>;
}

/// Connection to the channel network.
#[async_trait]
pub trait ChannelClient: Send + Sync {
    type Session: ChannelSession;

    /// Opens an authenticated session.
    async fn open_session(&self) -> Result<Self::Session>;
}

/// One open scraping session.
#[async_trait]
pub trait ChannelSession: Send + Sync {
    /// Fetches text messages of `channel` within `window`.
    async fn fetch_channel(&self, channel: &str, window: &DateWindow) -> Result<Vec<MessageRecord>>;
}

/// Scrapes every channel listed for a source.
pub struct ChannelScraper<C> {
    client: C,
    channels_dir: PathBuf,
}

impl<C: ChannelClient> ChannelScraper<C> {
    pub fn new(client: C, channels_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            channels_dir: channels_dir.into(),
        }
    }

    /// Reads `<channels_dir>/source_N.json`, a JSON array of channel names.
    pub async fn load_channels(&self, source: ChannelSource) -> Result<Vec<String>> {
        let path = self.channels_dir.join(source.channels_file());
        let content = tokio::fs::read(&path).await.map_err(|e| {
            PipelineError::Configuration(format!(
                "channel list {} unavailable: {}",
                path.display(),
                e
            ))
        })?;
        serde_json::from_slice(&content).map_err(|e| {
            PipelineError::Configuration(format!(
                "channel list {} is not a JSON array of names: {}",
                path.display(),
                e
            ))
        })
    }
}

#[async_trait]
impl<C: ChannelClient> ScrapeProvider for ChannelScraper<C> {
    async fn scrape(&self, window: &DateWindow, source: ChannelSource) -> Result<Vec<MessageRecord>> {
        let channels = self.load_channels(source).await?;
        let session = self.client.open_session().await?;

        let fetches = channels.iter().map(|channel| {
            let session = &session;
            async move {
                match session.fetch_channel(channel, window).await {
                    Ok(messages) => {
                        debug!(channel = %channel, count = messages.len(), "channel fetched");
                        messages
                    }
                    Err(e) => {
                        warn!(channel = %channel, error = %e, "skipping unavailable channel");
                        Vec::new()
                    }
                }
            }
        });

        let messages: Vec<MessageRecord> = join_all(fetches)
            .await
            .into_iter()
            .flatten()
            .filter(|m| m.has_text() && window.contains(&m.publication_date))
            .collect();

        info!(
            source = %source,
            channels = channels.len(),
            messages = messages.len(),
            "scrape finished"
        );
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, FixedOffset, Utc};
    use digest_models::Period;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    struct FakeClient {
        sessions: Arc<AtomicUsize>,
    }

    struct FakeSession;

    #[async_trait]
    impl ChannelClient for FakeClient {
        type Session = FakeSession;

        async fn open_session(&self) -> Result<FakeSession> {
            self.sessions.fetch_add(1, Ordering::SeqCst);
            Ok(FakeSession)
        }
    }

    #[async_trait]
    impl ChannelSession for FakeSession {
        async fn fetch_channel(&self, channel: &str, window: &DateWindow) -> Result<Vec<MessageRecord>> {
            if channel == "@private" {
                return Err(PipelineError::Scrape("channel is private".into()));
            }
            let inside = window.start + Duration::hours(1);
            let outside = window.start - Duration::hours(1);
            Ok(vec![
                MessageRecord::new(channel, 1, inside, "inside"),
                MessageRecord::new(channel, 2, outside, "outside"),
                MessageRecord::new(channel, 3, inside, "  "),
            ])
        }
    }

    fn window() -> DateWindow {
        let now = DateTime::parse_from_rfc3339("2025-03-10T11:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        Period::Yesterday
            .window(now, FixedOffset::east_opt(3 * 3600).unwrap())
            .unwrap()
    }

    #[tokio::test]
    async fn test_scrape_skips_failing_channels() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("source_2.json"), r#"["@a", "@private", "@b"]"#).unwrap();

        let sessions = Arc::new(AtomicUsize::new(0));
        let scraper = ChannelScraper::new(
            FakeClient {
                sessions: sessions.clone(),
            },
            dir.path(),
        );

        let messages = scraper.scrape(&window(), ChannelSource::Source2).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|m| m.text == "inside"));
        assert_eq!(sessions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_channel_list_is_fatal() {
        let dir = tempdir().unwrap();
        let scraper = ChannelScraper::new(
            FakeClient {
                sessions: Arc::new(AtomicUsize::new(0)),
            },
            dir.path(),
        );

        let err = scraper.scrape(&window(), ChannelSource::Source1).await.unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_malformed_channel_list() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("source_1.json"), r#"{"channels": 1}"#).unwrap();
        let scraper = ChannelScraper::new(
            FakeClient {
                sessions: Arc::new(AtomicUsize::new(0)),
            },
            dir.path(),
        );

        let err = scraper.load_channels(ChannelSource::Source1).await.unwrap_err();
        assert!(err.to_string().contains("source_1.json"));
    }
}
