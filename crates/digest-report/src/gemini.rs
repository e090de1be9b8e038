//! Google Gemini adapter (`generateContent` REST API).

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{ReportError, Result};
use crate::provider::{http_client, LlmProvider, MAX_OUTPUT_TOKENS, TEMPERATURE};

const TOP_P: f32 = 1.0;
const TOP_K: u32 = 40;
const THINKING_BUDGET: u32 = 24_576;

/// Gemini provider calling the model directly with an API key.
#[derive(Clone)]
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiProvider {
    pub fn new(
        api_key: impl Into<String>,
        base_url: &str,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
    response_mime_type: &'static str,
    thinking_config: ThinkingConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn generate(&self, system_prompt: &str, user_content: &str) -> Result<String> {
        let request = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: system_prompt,
                }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: user_content }],
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                top_p: TOP_P,
                top_k: TOP_K,
                max_output_tokens: MAX_OUTPUT_TOKENS,
                response_mime_type: "application/json",
                thinking_config: ThinkingConfig {
                    thinking_budget: THINKING_BUDGET,
                },
            },
        };

        info!(model = %self.model, input_chars = user_content.len(), "sending request to Gemini");

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| ReportError::Request(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReportError::Api {
                provider: "Gemini",
                status: status.as_u16(),
                body,
            });
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| ReportError::Parse(format!("invalid Gemini response: {}", e)))?;

        if let Some(usage) = json.get("usageMetadata") {
            debug!(
                prompt_tokens = usage["promptTokenCount"].as_u64().unwrap_or(0),
                output_tokens = usage["candidatesTokenCount"].as_u64().unwrap_or(0),
                total_tokens = usage["totalTokenCount"].as_u64().unwrap_or(0),
                "Gemini usage"
            );
        }

        extract_text(&json)
    }
}

/// Joins the non-thought text parts of the first candidate.
fn extract_text(json: &Value) -> Result<String> {
    let parts = json["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or_else(|| {
            let reason = json["candidates"][0]["finishReason"]
                .as_str()
                .or_else(|| json["promptFeedback"]["blockReason"].as_str())
                .unwrap_or("no candidates");
            ReportError::Parse(format!("Gemini returned no content ({})", reason))
        })?;

    let text: String = parts
        .iter()
        .filter(|p| !p["thought"].as_bool().unwrap_or(false))
        .filter_map(|p| p["text"].as_str())
        .collect();

    if text.trim().is_empty() {
        return Err(ReportError::Parse("Gemini returned empty text".to_string()));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, routing::post, Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_extract_text_skips_thoughts() {
        let json = json!({
            "candidates": [{"content": {"parts": [
                {"text": "thinking...", "thought": true},
                {"text": "{\"items\":"},
                {"text": "[]}"}
            ]}}]
        });
        assert_eq!(extract_text(&json).unwrap(), "{\"items\":[]}");
    }

    #[test]
    fn test_extract_text_blocked() {
        let json = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let err = extract_text(&json).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[tokio::test]
    async fn test_generate_sends_config_and_key() {
        let router = Router::new().route(
            "/models/gemini-test:generateContent",
            post(
                |Query(q): Query<HashMap<String, String>>, Json(body): Json<Value>| async move {
                    assert_eq!(q.get("key").map(String::as_str), Some("secret"));
                    assert_eq!(body["generationConfig"]["topK"], 40);
                    assert_eq!(body["generationConfig"]["maxOutputTokens"], 65536);
                    assert_eq!(
                        body["generationConfig"]["responseMimeType"],
                        "application/json"
                    );
                    assert_eq!(
                        body["generationConfig"]["thinkingConfig"]["thinkingBudget"],
                        24576
                    );
                    assert_eq!(body["systemInstruction"]["parts"][0]["text"], "sys");
                    assert_eq!(body["contents"][0]["parts"][0]["text"], "user");
                    Json(json!({
                        "candidates": [{"content": {"parts": [{"text": "{\"items\": []}"}]}}],
                        "usageMetadata": {"totalTokenCount": 12}
                    }))
                },
            ),
        );
        let base = spawn(router).await;

        let provider =
            GeminiProvider::new("secret", &base, "gemini-test", Duration::from_secs(5)).unwrap();
        let text = provider.generate("sys", "user").await.unwrap();
        assert_eq!(text, "{\"items\": []}");
    }

    #[tokio::test]
    async fn test_generate_api_error() {
        let router = Router::new().route(
            "/models/m:generateContent",
            post(|| async { (axum::http::StatusCode::TOO_MANY_REQUESTS, "quota") }),
        );
        let base = spawn(router).await;

        let provider = GeminiProvider::new("k", &base, "m", Duration::from_secs(5)).unwrap();
        let err = provider.generate("s", "u").await.unwrap_err();
        assert!(matches!(err, ReportError::Api { status: 429, .. }));
    }
}
