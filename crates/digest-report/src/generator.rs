//! Messages to structured report data.

use std::path::PathBuf;

use chrono::{FixedOffset, NaiveDate, Utc};
use digest_models::{MessageRecord, ReportType};
use serde_json::{Map, Value};
use tracing::info;

use crate::error::{ReportError, Result};
use crate::prepare::{load_prompt, prepare_message_text};
use crate::provider::LlmProvider;
use crate::sanitize::parse_report_json;

/// Field added to every report with the local generation date.
pub const GENERATION_DATE_FIELD: &str = "generation_date";

/// Runs the LLM step of the pipeline.
#[derive(Debug, Clone)]
pub struct ReportGenerator {
    prompts_dir: PathBuf,
    offset: FixedOffset,
}

impl ReportGenerator {
    pub fn new(prompts_dir: impl Into<PathBuf>, offset: FixedOffset) -> Self {
        Self {
            prompts_dir: prompts_dir.into(),
            offset,
        }
    }

    pub fn prompts_dir(&self) -> &PathBuf {
        &self.prompts_dir
    }

    /// Local date used for prompts and `generation_date`.
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.offset).date_naive()
    }

    /// Generates report data dated today.
    pub async fn generate(
        &self,
        provider: &dyn LlmProvider,
        messages: Vec<MessageRecord>,
        report_type: ReportType,
    ) -> Result<Map<String, Value>> {
        self.generate_on(provider, messages, report_type, self.today()).await
    }

    /// Generates report data for an explicit report date.
    ///
    /// `messages` is consumed; only the prepared text is held across the
    /// model call.
    pub async fn generate_on(
        &self,
        provider: &dyn LlmProvider,
        messages: Vec<MessageRecord>,
        report_type: ReportType,
        report_date: NaiveDate,
    ) -> Result<Map<String, Value>> {
        info!(
            provider = provider.name(),
            model = provider.model_id(),
            report_type = %report_type,
            messages = messages.len(),
            "generating report"
        );

        let user_content = tokio::task::spawn_blocking(move || prepare_message_text(&messages))
            .await
            .map_err(|e| ReportError::Render(format!("message preparation task failed: {}", e)))??;

        let system_prompt = load_prompt(&self.prompts_dir, report_type, report_date).await?;

        let raw = provider.generate(&system_prompt, &user_content).await?;
        drop(user_content);

        info!(response_chars = raw.len(), "model response received");

        let mut data = parse_report_json(&raw)?;
        data.insert(
            GENERATION_DATE_FIELD.to_string(),
            Value::String(report_date.format("%d.%m.%Y").to_string()),
        );
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct CannedProvider {
        response: String,
        seen: Mutex<Option<(String, String)>>,
    }

    #[async_trait]
    impl LlmProvider for CannedProvider {
        fn name(&self) -> &'static str {
            "canned"
        }

        fn model_id(&self) -> &str {
            "canned-1"
        }

        async fn generate(&self, system_prompt: &str, user_content: &str) -> Result<String> {
            *self.seen.lock().unwrap() = Some((system_prompt.to_string(), user_content.to_string()));
            Ok(self.response.clone())
        }
    }

    fn canned(response: &str) -> CannedProvider {
        CannedProvider {
            response: response.to_string(),
            seen: Mutex::new(None),
        }
    }

    fn messages() -> Vec<MessageRecord> {
        vec![MessageRecord::new(
            "@news",
            1,
            DateTime::parse_from_rfc3339("2025-03-09T10:00:00+03:00").unwrap(),
            "Something happened",
        )]
    }

    fn generator() -> (tempfile::TempDir, ReportGenerator) {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("news.md"), "Digest for [REPORT_DATE]").unwrap();
        let generator = ReportGenerator::new(dir.path(), FixedOffset::east_opt(3 * 3600).unwrap());
        (dir, generator)
    }

    #[tokio::test]
    async fn test_generate_adds_generation_date() {
        let (_dir, generator) = generator();
        let provider = canned("```json\n{\"items\": [{\"title\": \"t\"}]}\n```");
        let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();

        let data = generator
            .generate_on(&provider, messages(), ReportType::News, date)
            .await
            .unwrap();

        assert_eq!(data["generation_date"], "10.03.2025");
        assert_eq!(data["items"][0]["title"], "t");

        let (system, user) = provider.seen.lock().unwrap().clone().unwrap();
        assert_eq!(system, "Digest for 2025-03-10");
        assert!(user.contains("Something happened"));
    }

    #[tokio::test]
    async fn test_generate_salvages_truncated_output() {
        let (_dir, generator) = generator();
        let provider = canned("{\"items\": [{\"a\": 1}, {\"a\": 2}, {\"a\"");
        let data = generator
            .generate(&provider, messages(), ReportType::News)
            .await
            .unwrap();
        assert_eq!(data["items"].as_array().unwrap().len(), 2);
        assert!(data.contains_key("generation_date"));
    }

    #[tokio::test]
    async fn test_generate_without_messages() {
        let (_dir, generator) = generator();
        let provider = canned("{}");
        let err = generator
            .generate(&provider, Vec::new(), ReportType::News)
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::NoMessages));
        assert!(provider.seen.lock().unwrap().is_none());
    }
}
