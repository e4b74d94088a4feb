//! Run summary notifications
//!
//! Delivery is best-effort: callers log a failed send and carry on.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::config::NotifyConfig;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, title: &str, body: &str) -> Result<()>;
}

/// Writes the notification to the log only
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, title: &str, body: &str) -> Result<()> {
        info!("Notification [{}]\n{}", title, body);
        Ok(())
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    title: &'a str,
    content: &'a str,
}

/// Posts `{"title": ..., "content": ...}` as JSON to a fixed URL
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build webhook client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, title: &str, body: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookPayload {
                title,
                content: body,
            })
            .send()
            .await
            .context("webhook request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("webhook answered {}", response.status());
        }
        Ok(())
    }
}

/// Pick the notifier described by `config`
pub fn from_config(config: &NotifyConfig, timeout: Duration) -> Result<Arc<dyn Notifier>> {
    match config.webhook_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => Ok(Arc::new(WebhookNotifier::new(url, timeout)?)),
        _ => Ok(Arc::new(LogNotifier)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        assert!(LogNotifier.send("title", "body").await.is_ok());
    }

    #[test]
    fn test_webhook_payload_shape() {
        let payload = serde_json::to_value(WebhookPayload {
            title: "Step runner",
            content: "2/2",
        })
        .unwrap();
        assert_eq!(payload, serde_json::json!({ "title": "Step runner", "content": "2/2" }));
    }

    #[test]
    fn test_from_config_without_url_logs() {
        let config = NotifyConfig {
            webhook_url: Some("   ".to_string()),
        };
        assert!(from_config(&config, Duration::from_secs(10)).is_ok());
    }
}
