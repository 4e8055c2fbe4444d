use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::models::EntrySummary;

pub mod openai;

pub use openai::{OpenAiConfig, OpenAiGenerator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// One call to the text generator.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub messages: Vec<Message>,
    /// When present, the generator may call the entry-analysis tool over
    /// these entries (newest first) before answering.
    pub analysis: Option<Vec<EntrySummary>>,
}

impl GenerationRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            analysis: None,
        }
    }

    pub fn with_analysis(mut self, entries: Vec<EntrySummary>) -> Self {
        self.analysis = Some(entries);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    pub model: String,
    pub tokens_used: u32,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request to text generator failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("text generator returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed generator response: {0}")]
    Malformed(String),
    #[error("text generator returned no content")]
    Empty,
    #[error("text generator timed out after {0:?}")]
    Timeout(Duration),
}

/// External text-generation service. One call is atomic from the caller's
/// point of view; callers never retry.
#[async_trait]
pub trait TextGenerator: Send + Sync + 'static {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, GatewayError>;
}
