use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::RecommenderConfig;
use crate::recommender::{Connector, Recommender};

const USER_AGENT: &str = concat!("shift-fill/", env!("CARGO_PKG_VERSION"));
const API_KEY_HEADER: &str = "x-goog-api-key";

pub struct HttpConnector {
    client: Client,
    url: String,
    temperature: f64,
}

impl HttpConnector {
    pub fn from_config(config: &RecommenderConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .context("failed to build recommender HTTP client")?;
        Ok(Self {
            client,
            url: generate_url(&config.endpoint, &config.model),
            temperature: config.temperature,
        })
    }
}

impl Connector for HttpConnector {
    fn connect(&self, credential: &str) -> Result<Arc<dyn Recommender>> {
        let api_key = credential.trim();
        if api_key.is_empty() {
            return Err(anyhow!("credential is empty"));
        }
        Ok(Arc::new(HttpRecommender {
            client: self.client.clone(),
            url: self.url.clone(),
            api_key: api_key.to_string(),
            temperature: self.temperature,
        }))
    }
}

pub struct HttpRecommender {
    client: Client,
    url: String,
    api_key: String,
    temperature: f64,
}

#[async_trait]
impl Recommender for HttpRecommender {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = request_body(prompt, self.temperature);
        let response = self
            .client
            .post(&self.url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("failed POST request: {}", self.url))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .with_context(|| format!("failed reading response body: {}", self.url))?;
        if !status.is_success() {
            let preview: String = text.chars().take(180).collect();
            return Err(anyhow!("POST {} returned {status}: {preview}", self.url));
        }
        let value: Value = serde_json::from_str(&text)
            .with_context(|| format!("invalid JSON envelope: {}", self.url))?;
        Ok(reply_text(&value))
    }
}

fn generate_url(endpoint: &str, model: &str) -> String {
    format!(
        "{}/models/{}:generateContent",
        endpoint.trim_end_matches('/'),
        model
    )
}

fn request_body(prompt: &str, temperature: f64) -> Value {
    json!({
        "contents": [
            {"role": "user", "parts": [{"text": prompt}]}
        ],
        "generationConfig": {
            "temperature": temperature,
            "responseMimeType": "application/json"
        }
    })
}

// Empty when there is no candidate.
fn reply_text(envelope: &Value) -> String {
    envelope
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}
