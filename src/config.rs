use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::notify::{ReconcilerConfig, RetryPolicy};
use crate::query::CachePolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_tick_rate")]
    pub tick_rate_fps: f64,
    /// Catalog items per page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_stale_time")]
    pub stale_time_secs: u64,
    #[serde(default = "default_cache_time")]
    pub cache_time_secs: u64,
    #[serde(default = "default_readiness_retry")]
    pub readiness_retry_ms: u64,
    #[serde(default = "default_readiness_max_delay")]
    pub readiness_max_delay_ms: u64,
    #[serde(default = "default_readiness_backoff")]
    pub readiness_backoff: f64,
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_notification_port")]
    pub notification_port: u16,
    #[serde(default = "default_oauth_callback_port")]
    pub oauth_callback_port: u16,
    #[serde(default = "default_identity_base_url")]
    pub identity_base_url: String,
}

fn default_tick_rate() -> f64 {
    30.0
}

fn default_page_size() -> u32 {
    10
}

fn default_api_base_url() -> String {
    crate::api::DEFAULT_BASE_URL.to_string()
}

fn default_stale_time() -> u64 {
    60 * 60
}

fn default_cache_time() -> u64 {
    24 * 60 * 60
}

fn default_readiness_retry() -> u64 {
    100
}

fn default_readiness_max_delay() -> u64 {
    1600
}

fn default_readiness_backoff() -> f64 {
    2.0
}

fn default_settle_delay() -> u64 {
    300
}

fn default_notification_port() -> u16 {
    8478
}

fn default_oauth_callback_port() -> u16 {
    8477
}

fn default_identity_base_url() -> String {
    crate::auth::DEFAULT_IDENTITY_BASE_URL.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tick_rate_fps: default_tick_rate(),
            page_size: default_page_size(),
            api_base_url: default_api_base_url(),
            stale_time_secs: default_stale_time(),
            cache_time_secs: default_cache_time(),
            readiness_retry_ms: default_readiness_retry(),
            readiness_max_delay_ms: default_readiness_max_delay(),
            readiness_backoff: default_readiness_backoff(),
            settle_delay_ms: default_settle_delay(),
            notification_port: default_notification_port(),
            oauth_callback_port: default_oauth_callback_port(),
            identity_base_url: default_identity_base_url(),
        }
    }
}

impl AppConfig {
    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy {
            stale_time: Duration::from_secs(self.stale_time_secs),
            cache_time: Duration::from_secs(self.cache_time_secs),
        }
    }

    pub fn reconciler(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            readiness: RetryPolicy {
                initial_delay: Duration::from_millis(self.readiness_retry_ms),
                max_delay: Duration::from_millis(self.readiness_max_delay_ms),
                factor: self.readiness_backoff,
            },
            settle_delay: Duration::from_millis(self.settle_delay_ms),
        }
    }

    /// Page size clamped to what the list endpoint accepts.
    pub fn page_limit(&self) -> u32 {
        self.page_size.clamp(1, 100)
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config/pokedextui/config.toml"))
}

pub fn load_config() -> AppConfig {
    let Some(path) = config_path() else {
        return AppConfig::default();
    };

    let Ok(contents) = fs::read_to_string(&path) else {
        return AppConfig::default();
    };

    parse_config(&contents)
}

/// Write `config` to `path` unless a file is already there.
pub fn ensure_config_file(path: &Path, config: &AppConfig) -> io::Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let contents = toml::to_string_pretty(config).map_err(io::Error::other)?;
    fs::write(path, contents)
}

fn parse_config(contents: &str) -> AppConfig {
    toml::from_str(contents).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "invalid config file, using defaults");
        AppConfig::default()
    })
}
