// src/control.rs
//! Fire-and-forget control calls towards the feed backend.
//!
//! The backend decides what "start" and "stop" mean; this side only sends the
//! request. The session never waits on these, it spawns them and logs failures.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::ClientConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedStatus {
    pub running: bool,
}

/// Manual submission accepted by the backend's news endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsSubmission {
    pub source: String,
    pub headline: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct FeedControl {
    client: Client,
    start_url: String,
    stop_url: String,
    status_url: String,
    news_url: String,
    timeout: Duration,
}

impl FeedControl {
    pub fn from_config(cfg: &ClientConfig) -> Self {
        Self {
            client: Client::new(),
            start_url: cfg.endpoint(&cfg.feed_start_path),
            stop_url: cfg.endpoint(&cfg.feed_stop_path),
            status_url: cfg.endpoint(&cfg.feed_status_path),
            news_url: cfg.endpoint(&cfg.news_path),
            timeout: Duration::from_secs(cfg.control_timeout_secs),
        }
    }

    pub async fn start_feed(&self) -> Result<()> {
        self.trigger(&self.start_url).await.context("feed start")
    }

    pub async fn stop_feed(&self) -> Result<()> {
        self.trigger(&self.stop_url).await.context("feed stop")
    }

    pub async fn status(&self) -> Result<FeedStatus> {
        let status = self
            .client
            .get(&self.status_url)
            .timeout(self.timeout)
            .send()
            .await
            .context("feed status request")?
            .error_for_status()
            .context("feed status non-2xx")?
            .json::<FeedStatus>()
            .await
            .context("feed status body")?;
        Ok(status)
    }

    pub async fn submit(&self, item: &NewsSubmission) -> Result<()> {
        self.client
            .post(&self.news_url)
            .timeout(self.timeout)
            .json(item)
            .send()
            .await
            .context("news submit")?
            .error_for_status()
            .context("news submit non-2xx")?;
        tracing::info!(target: "control", headline = %item.headline, "news submitted");
        Ok(())
    }

    async fn trigger(&self, url: &str) -> Result<()> {
        self.client
            .post(url)
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?
            .error_for_status()
            .with_context(|| format!("POST {url} non-2xx"))?;
        tracing::debug!(target: "control", url, "control trigger sent");
        Ok(())
    }
}
