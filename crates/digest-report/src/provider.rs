//! LLM provider seam.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use digest_models::{ModelAlias, ProviderMode};

use crate::error::{ReportError, Result};
use crate::gemini::GeminiProvider;
use crate::polza::PolzaProvider;

/// Sampling temperature shared by both providers.
pub const TEMPERATURE: f32 = 0.3;

/// Output token ceiling shared by both providers.
pub const MAX_OUTPUT_TOKENS: u32 = 65_536;

/// Default per-request timeout. Long digests take minutes to generate.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// A text-in, text-out language model.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &'static str;

    /// Concrete model identifier sent to the API.
    fn model_id(&self) -> &str;

    /// Runs one completion and returns the raw response text.
    async fn generate(&self, system_prompt: &str, user_content: &str) -> Result<String>;
}

/// Credentials and endpoints for building providers.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub google_api_key: Option<String>,
    pub gemini_api_url: String,
    pub polza_api_key: Option<String>,
    pub polza_api_url: String,
    pub request_timeout: Duration,
}

impl ProviderSettings {
    /// Creates settings with no keys and the given endpoints.
    pub fn new(gemini_api_url: impl Into<String>, polza_api_url: impl Into<String>) -> Self {
        Self {
            google_api_key: None,
            gemini_api_url: gemini_api_url.into(),
            polza_api_key: None,
            polza_api_url: polza_api_url.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_google_api_key(mut self, key: Option<String>) -> Self {
        self.google_api_key = key;
        self
    }

    pub fn with_polza_api_key(mut self, key: Option<String>) -> Self {
        self.polza_api_key = key;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Builds the provider for `mode`, resolving `alias` to that provider's model.
///
/// Fails with `ReportError::Configuration` when the provider's API key is absent.
pub fn build_provider(
    mode: ProviderMode,
    alias: ModelAlias,
    settings: &ProviderSettings,
) -> Result<Arc<dyn LlmProvider>> {
    let model = alias.model_for(mode);
    match mode {
        ProviderMode::Free => {
            let key = settings.google_api_key.clone().ok_or_else(|| {
                ReportError::Configuration("GOOGLE_API_KEY is not set".to_string())
            })?;
            Ok(Arc::new(GeminiProvider::new(
                key,
                &settings.gemini_api_url,
                model,
                settings.request_timeout,
            )?))
        }
        ProviderMode::Paid => {
            let key = settings.polza_api_key.clone().ok_or_else(|| {
                ReportError::Configuration("POLZA_API_KEY is not set".to_string())
            })?;
            Ok(Arc::new(PolzaProvider::new(
                key,
                &settings.polza_api_url,
                model,
                settings.request_timeout,
            )?))
        }
    }
}

/// Resolves a provider per request.
pub trait ProviderFactory: Send + Sync {
    fn provider(&self, mode: ProviderMode, alias: ModelAlias) -> Result<Arc<dyn LlmProvider>>;
}

impl ProviderFactory for ProviderSettings {
    fn provider(&self, mode: ProviderMode, alias: ModelAlias) -> Result<Arc<dyn LlmProvider>> {
        build_provider(mode, alias, self)
    }
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ReportError::Configuration(format!("failed to build HTTP client: {}", e)))
}
