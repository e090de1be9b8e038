//! Shared state for the Telegram bot.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use digest_core::JobRegistry;
use digest_models::JobStatus;
use digest_pipeline::ReportPipeline;
use serde_json::json;
use teloxide::types::ChatId;
use tokio::sync::{Mutex, RwLock};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::dialogue::{Choice, DaysInputError, Dialogue, Transition};

/// Minimum interval between two keyboard actions of one user.
pub const DEFAULT_RATE_LIMIT: Duration = Duration::from_millis(600);

/// Bot settings.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Users allowed to talk to the bot. Empty allows everyone.
    pub allowed_users: HashSet<i64>,
    /// Minimum interval between keyboard actions per user.
    pub rate_limit: Duration,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            allowed_users: HashSet::new(),
            rate_limit: DEFAULT_RATE_LIMIT,
        }
    }
}

impl BotConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_allowed_users(mut self, users: impl IntoIterator<Item = i64>) -> Self {
        self.allowed_users = users.into_iter().collect();
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: Duration) -> Self {
        self.rate_limit = rate_limit;
        self
    }
}

/// A running report job.
#[derive(Debug)]
struct ActiveTask {
    job_id: String,
    chat_id: ChatId,
    abort: AbortHandle,
}

/// A job that was stopped by `/cancel` or shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelledTask {
    pub user_id: i64,
    pub job_id: String,
    pub chat_id: ChatId,
}

/// Shared state for the Telegram bot, accessible across all handlers.
pub struct BotState {
    pipeline: Arc<ReportPipeline>,
    config: BotConfig,
    /// Dialogue per user.
    dialogues: RwLock<HashMap<i64, Dialogue>>,
    /// Last accepted keyboard action per user.
    last_action: Mutex<HashMap<i64, Instant>>,
    /// At most one running job per user.
    tasks: Mutex<HashMap<i64, ActiveTask>>,
}

impl BotState {
    pub fn new(pipeline: Arc<ReportPipeline>, config: BotConfig) -> Self {
        Self {
            pipeline,
            config,
            dialogues: RwLock::new(HashMap::new()),
            last_action: Mutex::new(HashMap::new()),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    pub fn pipeline(&self) -> &Arc<ReportPipeline> {
        &self.pipeline
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        self.pipeline.registry()
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    /// Whether `user_id` may use the bot.
    pub fn is_allowed(&self, user_id: i64) -> bool {
        self.config.allowed_users.is_empty() || self.config.allowed_users.contains(&user_id)
    }

    /// Records an action and reports whether it came too soon after the
    /// previous accepted one. Rejected actions do not reset the window.
    ///
    /// Accepting an action drops every entry whose window has already
    /// passed, so the map only holds users active within the last window.
    pub async fn rate_limited(&self, user_id: i64) -> bool {
        let now = Instant::now();
        let window = self.config.rate_limit;
        let mut last = self.last_action.lock().await;
        match last.get(&user_id) {
            Some(&at) if now.duration_since(at) < window => {
                debug!(user_id, "action rate limited");
                true
            }
            _ => {
                last.retain(|_, at| now.duration_since(*at) < window);
                last.insert(user_id, now);
                false
            }
        }
    }

    /// Current dialogue of `user_id`.
    pub async fn dialogue(&self, user_id: i64) -> Dialogue {
        self.dialogues
            .read()
            .await
            .get(&user_id)
            .copied()
            .unwrap_or_default()
    }

    /// Applies a keyboard choice to the user's dialogue.
    pub async fn apply_choice(&self, user_id: i64, choice: Choice) -> (Transition, Dialogue) {
        let mut dialogues = self.dialogues.write().await;
        let dialogue = dialogues.entry(user_id).or_default();
        let transition = dialogue.apply(choice);
        let current = *dialogue;
        if matches!(transition, Transition::Launch(_)) {
            dialogues.remove(&user_id);
        }
        (transition, current)
    }

    /// Applies a typed day count to the user's dialogue.
    pub async fn enter_days(
        &self,
        user_id: i64,
        text: &str,
    ) -> Result<(Transition, Dialogue), DaysInputError> {
        let mut dialogues = self.dialogues.write().await;
        let dialogue = dialogues.entry(user_id).or_default();
        let transition = dialogue.enter_days(text)?;
        Ok((transition, *dialogue))
    }

    /// Returns the user's dialogue to the first step.
    pub async fn reset_dialogue(&self, user_id: i64) {
        self.dialogues.write().await.remove(&user_id);
    }

    /// Job id of the user's running task.
    pub async fn active_job(&self, user_id: i64) -> Option<String> {
        self.tasks
            .lock()
            .await
            .get(&user_id)
            .map(|t| t.job_id.clone())
    }

    /// Spawns `task` as the user's job unless one is already running.
    ///
    /// The entry is removed when the task finishes. Returns `false` and
    /// drops `task` if the user already has a job.
    pub async fn spawn_task<F>(
        self: &Arc<Self>,
        user_id: i64,
        chat_id: ChatId,
        job_id: String,
        task: F,
    ) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock().await;
        if tasks.contains_key(&user_id) {
            return false;
        }

        let state = Arc::clone(self);
        let finished_id = job_id.clone();
        let handle = tokio::spawn(async move {
            task.await;
            let mut tasks = state.tasks.lock().await;
            if tasks.get(&user_id).is_some_and(|t| t.job_id == finished_id) {
                tasks.remove(&user_id);
            }
        });

        info!(user_id, job_id = %job_id, "report task started");
        tasks.insert(
            user_id,
            ActiveTask {
                job_id,
                chat_id,
                abort: handle.abort_handle(),
            },
        );
        true
    }

    /// Aborts the user's running task and marks its job as failed.
    pub async fn cancel_task(&self, user_id: i64, reason: &str) -> Option<CancelledTask> {
        let task = self.tasks.lock().await.remove(&user_id)?;
        Some(self.stop(user_id, task, reason).await)
    }

    /// Aborts every running task.
    pub async fn cancel_all(&self, reason: &str) -> Vec<CancelledTask> {
        let drained: Vec<(i64, ActiveTask)> = self.tasks.lock().await.drain().collect();
        let mut cancelled = Vec::with_capacity(drained.len());
        for (user_id, task) in drained {
            cancelled.push(self.stop(user_id, task, reason).await);
        }
        cancelled
    }

    async fn stop(&self, user_id: i64, task: ActiveTask, reason: &str) -> CancelledTask {
        task.abort.abort();
        self.registry()
            .put(
                task.job_id.as_str(),
                Some(json!({ "stage": "cancelled", "error": reason })),
                JobStatus::Error,
            )
            .await;
        info!(user_id, job_id = %task.job_id, reason, "report task cancelled");
        CancelledTask {
            user_id,
            job_id: task.job_id,
            chat_id: task.chat_id,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, FixedOffset, Utc};
    use digest_core::{CachePolicy, ManualClock, ScrapeGate, TtlPolicy, DEFAULT_TODAY_MAX_AGE};
    use digest_models::{ChannelSource, DateWindow, MessageRecord, ModelAlias, ProviderMode};
    use digest_persistence::FsArtifactStore;
    use digest_pipeline::{MessageFetcher, ScrapeProvider};
    use digest_report::{LlmProvider, MarkdownRenderer, ProviderFactory, ReportGenerator};
    use tempfile::TempDir;

    struct NoMessages;

    #[async_trait]
    impl ScrapeProvider for NoMessages {
        async fn scrape(
            &self,
            _window: &DateWindow,
            _source: ChannelSource,
        ) -> digest_pipeline::Result<Vec<MessageRecord>> {
            Ok(Vec::new())
        }
    }

    struct Unconfigured;

    impl ProviderFactory for Unconfigured {
        fn provider(
            &self,
            _mode: ProviderMode,
            _alias: ModelAlias,
        ) -> digest_report::Result<Arc<dyn LlmProvider>> {
            Err(digest_report::ReportError::Configuration("no provider".into()))
        }
    }

    /// Bot state over a pipeline that never finds messages.
    pub fn make_test_state(config: BotConfig) -> (TempDir, Arc<BotState>) {
        let dir = tempfile::tempdir().unwrap();
        let now: DateTime<Utc> = Utc::now();
        let clock = Arc::new(ManualClock::new(now));
        let offset = FixedOffset::east_opt(3 * 3600).unwrap();
        let registry = Arc::new(JobRegistry::with_policy(TtlPolicy::default(), clock.clone()));
        let fetcher = MessageFetcher::new(
            Arc::new(FsArtifactStore::new(dir.path().join("data"))),
            CachePolicy::with_clock(DEFAULT_TODAY_MAX_AGE, clock.clone()),
            ScrapeGate::new(),
            Arc::new(NoMessages),
        );
        let pipeline = ReportPipeline::new(
            fetcher,
            ReportGenerator::new(dir.path().join("prompts"), offset),
            Arc::new(MarkdownRenderer),
            Arc::new(Unconfigured),
            registry,
            clock,
            offset,
        );
        (dir, Arc::new(BotState::new(Arc::new(pipeline), config)))
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::make_test_state;
    use super::*;
    use crate::dialogue::Step;

    #[test]
    fn test_allow_list() {
        let (_dir, open) = make_test_state(BotConfig::new());
        assert!(open.is_allowed(42));

        let (_dir, closed) = make_test_state(BotConfig::new().with_allowed_users([1, 2]));
        assert!(closed.is_allowed(2));
        assert!(!closed.is_allowed(42));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_window() {
        let (_dir, state) = make_test_state(BotConfig::new());

        assert!(!state.rate_limited(7).await);
        assert!(state.rate_limited(7).await);
        assert!(!state.rate_limited(8).await);

        tokio::time::advance(Duration::from_millis(400)).await;
        assert!(state.rate_limited(7).await);

        tokio::time::advance(Duration::from_millis(250)).await;
        assert!(!state.rate_limited(7).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_entries_pruned() {
        let (_dir, state) = make_test_state(BotConfig::new().with_rate_limit(Duration::from_secs(1)));
        for user in 1..=100 {
            assert!(!state.rate_limited(user).await);
        }
        assert_eq!(state.last_action.lock().await.len(), 100);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!state.rate_limited(500).await);

        let last = state.last_action.lock().await;
        assert_eq!(last.len(), 1);
        assert!(last.contains_key(&500));
    }

    #[tokio::test]
    async fn test_dialogue_per_user() {
        let (_dir, state) = make_test_state(BotConfig::new());

        let (transition, dialogue) = state
            .apply_choice(1, Choice::parse("mode:free").unwrap())
            .await;
        assert_eq!(transition, Transition::Show(Step::Source));
        assert_eq!(dialogue.step(), Step::Source);
        assert_eq!(state.dialogue(2).await.step(), Step::Provider);

        state.reset_dialogue(1).await;
        assert_eq!(state.dialogue(1).await.step(), Step::Provider);
    }

    #[tokio::test]
    async fn test_launch_forgets_dialogue() {
        let (_dir, state) = make_test_state(BotConfig::new());
        let mut transition = Transition::Show(Step::Provider);
        for data in ["mode:free", "source:source_1", "type:news", "period:today", "model:flash_2_5"] {
            transition = state.apply_choice(9, Choice::parse(data).unwrap()).await.0;
        }

        assert!(matches!(transition, Transition::Launch(_)));
        assert!(state.dialogues.read().await.is_empty());
        assert_eq!(state.dialogue(9).await.step(), Step::Provider);
    }

    #[tokio::test]
    async fn test_one_task_per_user() {
        let (_dir, state) = make_test_state(BotConfig::new());
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        assert!(
            state
                .spawn_task(1, ChatId(1), "1_100".into(), async move {
                    let _ = release_rx.await;
                })
                .await
        );
        assert!(!state.spawn_task(1, ChatId(1), "1_101".into(), async {}).await);
        assert!(state.spawn_task(2, ChatId(2), "2_100".into(), async {}).await);
        assert_eq!(state.active_job(1).await.as_deref(), Some("1_100"));

        release_tx.send(()).unwrap();
        for _ in 0..50 {
            if state.active_job(1).await.is_none() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(state.active_job(1).await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_marks_job_failed() {
        let (_dir, state) = make_test_state(BotConfig::new());
        state
            .registry()
            .put("5_100", Some(json!({"stage": "fetching"})), JobStatus::Processing)
            .await;
        state
            .spawn_task(5, ChatId(5), "5_100".into(), std::future::pending())
            .await;

        let cancelled = state.cancel_task(5, "cancelled by user").await.unwrap();
        assert_eq!(cancelled.job_id, "5_100");
        assert_eq!(state.registry().status("5_100").await, Some(JobStatus::Error));
        assert!(state.active_job(5).await.is_none());
        assert!(state.cancel_task(5, "again").await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_all() {
        let (_dir, state) = make_test_state(BotConfig::new());
        for user in [1, 2, 3] {
            state
                .spawn_task(user, ChatId(user), format!("{}_1", user), std::future::pending())
                .await;
        }

        let mut users: Vec<i64> = state
            .cancel_all("shutdown")
            .await
            .into_iter()
            .map(|c| c.user_id)
            .collect();
        users.sort();
        assert_eq!(users, vec![1, 2, 3]);
        for user in [1, 2, 3] {
            assert!(state.active_job(user).await.is_none());
        }
    }
}
