//! HTTP client for an external channel scraping bridge.
//!
//! The bridge owns the channel-network session and exposes:
//! - `GET  {base}/health` - session check, non-2xx means not authorized
//! - `POST {base}/messages` - body `{channel, start, end}` (RFC 3339), answers
//!   a JSON array of message records

use std::time::Duration;

use async_trait::async_trait;
use digest_models::{DateWindow, MessageRecord};
use serde::Serialize;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::scraper::{ChannelClient, ChannelSession};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// `ChannelClient` backed by the scraping bridge.
#[derive(Clone)]
pub struct HttpBridgeClient {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl HttpBridgeClient {
    /// Creates a client. A `None` URL fails at first use.
    pub fn new(base_url: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| PipelineError::Configuration(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
        })
    }
}

#[async_trait]
impl ChannelClient for HttpBridgeClient {
    type Session = BridgeSession;

    async fn open_session(&self) -> Result<BridgeSession> {
        let base_url = self
            .base_url
            .clone()
            .ok_or_else(|| PipelineError::Configuration("SCRAPER_BRIDGE_URL is not set".to_string()))?;

        let response = self
            .client
            .get(format!("{}/health", base_url))
            .send()
            .await
            .map_err(|e| PipelineError::Scrape(format!("bridge unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PipelineError::Configuration(format!(
                "bridge session unavailable ({}): {}",
                status, text
            )));
        }

        debug!(bridge = %base_url, "scraping session opened");
        Ok(BridgeSession {
            client: self.client.clone(),
            base_url,
        })
    }
}

/// Session on the bridge.
pub struct BridgeSession {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct FetchRequest<'a> {
    channel: &'a str,
    start: String,
    end: String,
}

#[async_trait]
impl ChannelSession for BridgeSession {
    async fn fetch_channel(&self, channel: &str, window: &DateWindow) -> Result<Vec<MessageRecord>> {
        let request = FetchRequest {
            channel,
            start: window.start.to_rfc3339(),
            end: window.end.to_rfc3339(),
        };

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| PipelineError::Scrape(format!("{}: {}", channel, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Scrape(format!("{}: bridge returned {}", channel, status)));
        }

        response
            .json()
            .await
            .map_err(|e| PipelineError::Scrape(format!("{}: invalid bridge response: {}", channel, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::StatusCode,
        routing::{get, post},
        Json, Router,
    };
    use chrono::{DateTime, FixedOffset, Utc};
    use digest_models::Period;
    use serde_json::{json, Value};

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
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
    async fn test_unset_url_is_configuration_error() {
        let client = HttpBridgeClient::new(None).unwrap();
        let err = client.open_session().await.err().unwrap();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_fetch_channel_round_trip() {
        let router = Router::new()
            .route("/health", get(|| async { "ok" }))
            .route(
                "/messages",
                post(|Json(body): Json<Value>| async move {
                    assert_eq!(body["start"], "2025-03-09T00:00:00+03:00");
                    if body["channel"] == "@gone" {
                        return Err(StatusCode::NOT_FOUND);
                    }
                    Ok(Json(json!([{
                        "channel_name": body["channel"],
                        "message_id": 5,
                        "publication_date": "2025-03-09T12:00:00+03:00",
                        "text": "hi"
                    }])))
                }),
            );
        let base = spawn(router).await;

        let client = HttpBridgeClient::new(Some(format!("{}/", base))).unwrap();
        let session = client.open_session().await.unwrap();

        let messages = session.fetch_channel("@news", &window()).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].channel_name, "@news");

        let err = session.fetch_channel("@gone", &window()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Scrape(_)));
    }

    #[tokio::test]
    async fn test_unhealthy_bridge() {
        let router = Router::new().route(
            "/health",
            get(|| async { (StatusCode::UNAUTHORIZED, "session expired") }),
        );
        let base = spawn(router).await;

        let client = HttpBridgeClient::new(Some(base)).unwrap();
        let err = client.open_session().await.err().unwrap();
        assert!(err.to_string().contains("session expired"));
    }
}
