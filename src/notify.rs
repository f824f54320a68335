//! Plain-text notifications, e.g. asking other stores for help covering a day.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, text: &str) -> Result<()>;
}

pub struct StdoutSink;

#[async_trait]
impl NotificationSink for StdoutSink {
    async fn send(&self, text: &str) -> Result<()> {
        println!("{text}");
        Ok(())
    }
}

pub struct WebhookSink {
    client: Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("shift-fill/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build webhook HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn send(&self, text: &str) -> Result<()> {
        self.client
            .post(&self.url)
            .json(&json!({ "text": text }))
            .send()
            .await
            .with_context(|| format!("failed POST request: {}", self.url))?
            .error_for_status()?;
        Ok(())
    }
}

/// Picks the webhook when a URL is configured, stdout otherwise.
pub fn sink_for(webhook_url: &str) -> Result<Box<dyn NotificationSink>> {
    if webhook_url.trim().is_empty() {
        Ok(Box::new(StdoutSink))
    } else {
        Ok(Box::new(WebhookSink::new(webhook_url.trim())?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdout_sink_accepts_text() {
        tokio_test::block_on(StdoutSink.send("Store 7 needs one more person 18:00-22:00"))
            .expect("stdout send");
    }

    #[test]
    fn blank_webhook_url_falls_back_to_stdout() {
        assert!(sink_for("   ").is_ok());
        assert!(sink_for("https://hooks.example.test/abc").is_ok());
    }
}
