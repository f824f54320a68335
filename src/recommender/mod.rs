pub mod http;
pub mod prompt;
pub mod validate;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{AssignmentError, AssignmentResult};
use crate::recommender::prompt::build_request;
use crate::recommender::validate::sanitize_reply;
use crate::types::{AssignmentInput, AssignmentReply};

pub use http::{HttpConnector, HttpRecommender};

const VALIDATION_PROMPT: &str = "Reply with the single word OK.";

#[async_trait]
pub trait Recommender: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

pub trait Connector: Send + Sync {
    fn connect(&self, credential: &str) -> Result<Arc<dyn Recommender>>;
}

#[derive(Clone)]
pub struct RecommendationClient {
    connector: Arc<dyn Connector>,
    active: Option<Arc<dyn Recommender>>,
}

impl RecommendationClient {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            active: None,
        }
    }

    pub fn initialize(&mut self, credential: &str) -> AssignmentResult<()> {
        let connection = self
            .connector
            .connect(credential)
            .map_err(AssignmentError::Transport)?;
        self.active = Some(connection);
        debug!("recommender connection initialized");
        Ok(())
    }

    pub fn clear(&mut self) {
        self.active = None;
    }

    pub fn is_initialized(&self) -> bool {
        self.active.is_some()
    }

    pub async fn request_assignment(
        &self,
        input: &AssignmentInput,
    ) -> AssignmentResult<AssignmentReply> {
        let connection = self.active.as_ref().ok_or(AssignmentError::NotInitialized)?;
        let prompt = build_request(input);
        info!(
            date = %input.date,
            gaps = input.gaps.len(),
            staff = input.available_staff.len(),
            "requesting assignment proposal"
        );
        let raw = connection
            .generate(&prompt)
            .await
            .map_err(AssignmentError::Transport)?;
        let parsed = parse_reply(&raw)?;
        let reply = sanitize_reply(&parsed);
        info!(
            proposed = reply.proposed_shifts.len(),
            unfilled = reply.unfilled_slots.len(),
            "assignment proposal received"
        );
        Ok(reply)
    }

    /// Never fails; every error collapses to `false`.
    pub async fn validate_credential(&self, candidate: &str) -> bool {
        let connection = match self.connector.connect(candidate) {
            Ok(connection) => connection,
            Err(e) => {
                warn!("credential validation could not connect: {e:#}");
                return false;
            }
        };
        match connection.generate(VALIDATION_PROMPT).await {
            Ok(reply) => !reply.trim().is_empty(),
            Err(e) => {
                warn!("credential validation failed: {e:#}");
                false
            }
        }
    }
}

pub fn parse_reply(raw: &str) -> AssignmentResult<Value> {
    let body = strip_code_fence(raw);
    let value: Value = serde_json::from_str(body)
        .map_err(|e| AssignmentError::MalformedResponse(e.to_string()))?;
    if !value.is_object() {
        return Err(AssignmentError::MalformedResponse(
            "expected a JSON object".to_string(),
        ));
    }
    Ok(value)
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
