//! Environment-driven configuration.
//!
//! # Environment Variables
//!
//! - `DIGEST_DATA_DIR`: artifact root (default `data`)
//! - `DIGEST_PROMPTS_DIR`: prompt files (default `prompts`)
//! - `DIGEST_CHANNELS_DIR`: channel list files (default `.`)
//! - `DIGEST_HOST` / `DIGEST_PORT`: HTTP bind (default `0.0.0.0:8000`)
//! - `DIGEST_UTC_OFFSET_HOURS`: local offset for report windows (default `3`)
//! - `TODAY_CACHE_MAX_AGE_SEC`: reuse limit for the live cache (default `300`)
//! - `MEMORY_CLEANUP_INTERVAL` / `ENABLE_MEMORY_CLEANUP`: reclaimer cadence and switch
//! - `RETENTION_DAYS` / `CLEANUP_TIME_HOUR` / `ENABLE_FILE_CLEANUP`: retention sweep
//! - `RETENTION_PROTECTED_PATHS`: comma separated paths the sweep never touches
//! - `ADMIN_TOKEN`: required `X-Admin-Token` for `/admin/*` when set
//! - `ALLOWED_USERS`: comma separated chat user ids; empty allows everyone
//! - `BOT_RATE_LIMIT_MS`: minimum gap between one user's bot actions (default `600`)
//! - `TELEGRAM_BOT_TOKEN`: enables the chat bot
//! - `SCRAPER_BRIDGE_URL`: channel scraping bridge endpoint
//! - `GOOGLE_API_KEY` / `GEMINI_API_URL`: Gemini provider
//! - `POLZA_API_KEY` / `POLZA_API_URL`: Polza provider

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use digest_persistence::RetentionConfig;

use crate::error::{CoreError, Result};
use crate::reclaimer::ReclaimerConfig;

/// Default Gemini REST endpoint.
pub const DEFAULT_GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default Polza REST endpoint.
pub const DEFAULT_POLZA_API_URL: &str = "https://api.polza.ai/api/v1";

/// Full application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub prompts_dir: PathBuf,
    pub channels_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub utc_offset_hours: i32,
    pub today_cache_max_age: Duration,
    pub memory_cleanup_interval: Duration,
    pub memory_cleanup_enabled: bool,
    pub retention_days: u32,
    pub cleanup_hour: u32,
    pub file_cleanup_enabled: bool,
    pub retention_protected: Vec<PathBuf>,
    pub admin_token: Option<String>,
    pub allowed_users: Vec<i64>,
    pub bot_rate_limit: Duration,
    pub telegram_bot_token: Option<String>,
    pub scraper_bridge_url: Option<String>,
    pub google_api_key: Option<String>,
    pub gemini_api_url: String,
    pub polza_api_key: Option<String>,
    pub polza_api_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            prompts_dir: PathBuf::from("prompts"),
            channels_dir: PathBuf::from("."),
            host: "0.0.0.0".to_string(),
            port: 8000,
            utc_offset_hours: 3,
            today_cache_max_age: Duration::from_secs(300),
            memory_cleanup_interval: Duration::from_secs(120),
            memory_cleanup_enabled: true,
            retention_days: 7,
            cleanup_hour: 3,
            file_cleanup_enabled: true,
            retention_protected: Vec::new(),
            admin_token: None,
            allowed_users: Vec::new(),
            bot_rate_limit: Duration::from_millis(600),
            telegram_bot_token: None,
            scraper_bridge_url: None,
            google_api_key: None,
            gemini_api_url: DEFAULT_GEMINI_API_URL.to_string(),
            polza_api_key: None,
            polza_api_url: DEFAULT_POLZA_API_URL.to_string(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        Ok(Self {
            data_dir: get("DIGEST_DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            prompts_dir: get("DIGEST_PROMPTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.prompts_dir),
            channels_dir: get("DIGEST_CHANNELS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.channels_dir),
            host: get("DIGEST_HOST").unwrap_or(defaults.host),
            port: parse_or("DIGEST_PORT", get("DIGEST_PORT"), defaults.port)?,
            utc_offset_hours: parse_or(
                "DIGEST_UTC_OFFSET_HOURS",
                get("DIGEST_UTC_OFFSET_HOURS"),
                defaults.utc_offset_hours,
            )?,
            today_cache_max_age: Duration::from_secs(parse_or(
                "TODAY_CACHE_MAX_AGE_SEC",
                get("TODAY_CACHE_MAX_AGE_SEC"),
                defaults.today_cache_max_age.as_secs(),
            )?),
            memory_cleanup_interval: Duration::from_secs(parse_or(
                "MEMORY_CLEANUP_INTERVAL",
                get("MEMORY_CLEANUP_INTERVAL"),
                defaults.memory_cleanup_interval.as_secs(),
            )?),
            memory_cleanup_enabled: get("ENABLE_MEMORY_CLEANUP")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.memory_cleanup_enabled),
            retention_days: parse_or("RETENTION_DAYS", get("RETENTION_DAYS"), defaults.retention_days)?,
            cleanup_hour: parse_or("CLEANUP_TIME_HOUR", get("CLEANUP_TIME_HOUR"), defaults.cleanup_hour)?,
            file_cleanup_enabled: get("ENABLE_FILE_CLEANUP")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.file_cleanup_enabled),
            retention_protected: get("RETENTION_PROTECTED_PATHS")
                .map(|v| parse_path_list(&v))
                .unwrap_or(defaults.retention_protected),
            admin_token: get("ADMIN_TOKEN"),
            allowed_users: get("ALLOWED_USERS")
                .map(|v| parse_user_list(&v))
                .transpose()?
                .unwrap_or_default(),
            bot_rate_limit: Duration::from_millis(parse_or(
                "BOT_RATE_LIMIT_MS",
                get("BOT_RATE_LIMIT_MS"),
                defaults.bot_rate_limit.as_millis() as u64,
            )?),
            telegram_bot_token: get("TELEGRAM_BOT_TOKEN"),
            scraper_bridge_url: get("SCRAPER_BRIDGE_URL"),
            google_api_key: get("GOOGLE_API_KEY"),
            gemini_api_url: get("GEMINI_API_URL").unwrap_or(defaults.gemini_api_url),
            polza_api_key: get("POLZA_API_KEY"),
            polza_api_url: get("POLZA_API_URL").unwrap_or(defaults.polza_api_url),
        })
    }

    /// Local offset for report windows. Out-of-range values fall back to UTC.
    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_hours * 3600).unwrap_or_else(|| Utc.fix())
    }

    /// HTTP bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Reclaimer settings derived from this config.
    pub fn reclaimer_config(&self) -> ReclaimerConfig {
        ReclaimerConfig::new().with_interval(self.memory_cleanup_interval)
    }

    /// Retention settings derived from this config.
    pub fn retention_config(&self) -> RetentionConfig {
        self.retention_protected.iter().fold(
            RetentionConfig::new(&self.data_dir)
                .with_retention_days(self.retention_days)
                .with_run_hour(self.cleanup_hour)
                .with_offset(self.utc_offset()),
            |config, path| config.with_forbidden(path.clone()),
        )
    }
}

fn parse_or<T: FromStr>(name: &'static str, value: Option<String>, default: T) -> Result<T> {
    match value {
        None => Ok(default),
        Some(v) => v.parse().map_err(|_| CoreError::InvalidEnv { name, value: v }),
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "true" | "1" | "t" | "yes")
}

fn parse_path_list(value: &str) -> Vec<PathBuf> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

fn parse_user_list(value: &str) -> Result<Vec<i64>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse().map_err(|_| CoreError::InvalidEnv {
                name: "ALLOWED_USERS",
                value: s.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.port, 8000);
        assert_eq!(config.today_cache_max_age, Duration::from_secs(300));
        assert_eq!(config.memory_cleanup_interval, Duration::from_secs(120));
        assert!(config.memory_cleanup_enabled);
        assert_eq!(config.retention_days, 7);
        assert_eq!(config.cleanup_hour, 3);
        assert!(config.admin_token.is_none());
        assert!(config.allowed_users.is_empty());
        assert_eq!(config.polza_api_url, DEFAULT_POLZA_API_URL);
        assert_eq!(config.utc_offset().local_minus_utc(), 3 * 3600);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("DIGEST_DATA_DIR", "/data"),
            ("DIGEST_PORT", "9000"),
            ("TODAY_CACHE_MAX_AGE_SEC", "60"),
            ("ENABLE_MEMORY_CLEANUP", "false"),
            ("ALLOWED_USERS", "111, 222,"),
            ("ADMIN_TOKEN", "secret"),
        ])
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/data"));
        assert_eq!(config.bind_address(), "0.0.0.0:9000");
        assert_eq!(config.today_cache_max_age, Duration::from_secs(60));
        assert!(!config.memory_cleanup_enabled);
        assert_eq!(config.allowed_users, vec![111, 222]);
        assert_eq!(config.admin_token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = load(&[("ADMIN_TOKEN", "  "), ("DIGEST_PORT", "")]).unwrap();
        assert!(config.admin_token.is_none());
        assert_eq!(config.port, 8000);
    }

    #[test]
    fn test_invalid_number_rejected() {
        let err = load(&[("RETENTION_DAYS", "seven")]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidEnv { name: "RETENTION_DAYS", .. }));

        let err = load(&[("ALLOWED_USERS", "12,abc")]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidEnv { name: "ALLOWED_USERS", .. }));
    }

    #[test]
    fn test_derived_configs() {
        let config = load(&[("MEMORY_CLEANUP_INTERVAL", "30"), ("CLEANUP_TIME_HOUR", "4")]).unwrap();
        assert_eq!(config.reclaimer_config().interval, Duration::from_secs(30));
        assert_eq!(config.retention_config().run_hour, 4);
    }

    #[test]
    fn test_retention_protected_paths() {
        let config = load(&[
            ("DIGEST_DATA_DIR", "/data"),
            ("RETENTION_PROTECTED_PATHS", "/data/raw_parses/pinned, /data/raw_parses/keep,"),
        ])
        .unwrap();
        let retention = config.retention_config();
        assert_eq!(
            retention.extra_forbidden,
            vec![
                PathBuf::from("/data/raw_parses/pinned"),
                PathBuf::from("/data/raw_parses/keep")
            ]
        );
        assert!(load(&[]).unwrap().retention_config().extra_forbidden.is_empty());
    }

    #[test]
    fn test_bot_rate_limit() {
        assert_eq!(load(&[]).unwrap().bot_rate_limit, Duration::from_millis(600));
        let config = load(&[("BOT_RATE_LIMIT_MS", "1500")]).unwrap();
        assert_eq!(config.bot_rate_limit, Duration::from_millis(1500));
        assert!(load(&[("BOT_RATE_LIMIT_MS", "fast")]).is_err());
    }
}
