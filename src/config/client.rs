// src/config/client.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::feed::store::DEFAULT_CAPACITY;

pub const ENV_CONFIG_PATH: &str = "LIVESTOCK_CONFIG_PATH";
pub const ENV_BASE_URL: &str = "LIVESTOCK_BASE_URL";

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_stream_path() -> String {
    "/api/stream".to_string()
}
fn default_feed_start_path() -> String {
    "/api/feed/start".to_string()
}
fn default_feed_stop_path() -> String {
    "/api/feed/stop".to_string()
}
fn default_feed_status_path() -> String {
    "/api/feed/status".to_string()
}
fn default_news_path() -> String {
    "/api/news".to_string()
}
fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}
fn default_true() -> bool {
    true
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_control_timeout() -> u64 {
    5
}

/// Output flavour of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

/// Optional bounded retry after a lost stream. `max_attempts = 0` disables it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub max_attempts: u8,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
        }
    }
}

impl ReconnectPolicy {
    pub fn enabled(&self) -> bool {
        self.max_attempts > 0
    }

    /// Delay before retry number `attempt` (1-based), or `None` when exhausted.
    pub fn delay_for(&self, attempt: u8) -> Option<std::time::Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let shift = u32::from(attempt - 1).min(20);
        let ms = self
            .base_delay_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_delay_ms);
        Some(std::time::Duration::from_millis(ms))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_stream_path")]
    pub stream_path: String,
    #[serde(default = "default_feed_start_path")]
    pub feed_start_path: String,
    #[serde(default = "default_feed_stop_path")]
    pub feed_stop_path: String,
    #[serde(default = "default_feed_status_path")]
    pub feed_status_path: String,
    #[serde(default = "default_news_path")]
    pub news_path: String,
    /// Size of the event window; 0 is treated as 1.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_true")]
    pub cache_bust: bool,
    /// Connect as soon as the session runs.
    #[serde(default = "default_true")]
    pub auto_start: bool,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_control_timeout")]
    pub control_timeout_secs: u64,
    #[serde(default)]
    pub reconnect: ReconnectPolicy,
    /// e.g. "127.0.0.1:9100"; exporter stays off when unset.
    #[serde(default)]
    pub metrics_addr: Option<String>,
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            stream_path: default_stream_path(),
            feed_start_path: default_feed_start_path(),
            feed_stop_path: default_feed_stop_path(),
            feed_status_path: default_feed_status_path(),
            news_path: default_news_path(),
            capacity: default_capacity(),
            cache_bust: true,
            auto_start: true,
            connect_timeout_secs: default_connect_timeout(),
            control_timeout_secs: default_control_timeout(),
            reconnect: ReconnectPolicy::default(),
            metrics_addr: None,
            log_format: LogFormat::default(),
        }
    }
}

impl ClientConfig {
    /// Defaults pointed at another backend.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Load from an explicit path. TOML or JSON, picked by extension.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading client config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg: ClientConfig = match ext.as_str() {
            "json" => serde_json::from_str(&content)
                .with_context(|| format!("parsing json config {}", path.display()))?,
            _ => toml::from_str(&content)
                .with_context(|| format!("parsing toml config {}", path.display()))?,
        };
        Ok(cfg.sanitized())
    }

    /// Load using env var + fallbacks:
    /// 1) $LIVESTOCK_CONFIG_PATH
    /// 2) config/livestock.toml
    /// 3) config/livestock.json
    /// 4) built-in defaults
    ///
    /// `$LIVESTOCK_BASE_URL` then overrides `base_url`.
    pub fn load_default() -> Result<Self> {
        let mut cfg = Self::load_file_default()?;
        if let Ok(url) = std::env::var(ENV_BASE_URL) {
            let url = url.trim();
            if !url.is_empty() {
                cfg.base_url = url.to_string();
            }
        }
        Ok(cfg.sanitized())
    }

    fn load_file_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        let toml_p = PathBuf::from("config/livestock.toml");
        if toml_p.exists() {
            return Self::load_from(&toml_p);
        }
        let json_p = PathBuf::from("config/livestock.json");
        if json_p.exists() {
            return Self::load_from(&json_p);
        }
        Ok(Self::default())
    }

    fn sanitized(mut self) -> Self {
        self.capacity = self.capacity.max(1);
        while self.base_url.ends_with('/') {
            self.base_url.pop();
        }
        self
    }

    /// Absolute URL for a backend path.
    pub fn endpoint(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }

    pub fn stream_url(&self) -> String {
        self.endpoint(&self.stream_path)
    }
}
