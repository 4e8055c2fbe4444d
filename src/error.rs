use thiserror::Error;
use uuid::Uuid;

use crate::decode::DecodeError;
use crate::gateway::GatewayError;
use crate::models::PromptCategory;

/// Why one generation attempt failed. Never leaves a workflow.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("generator output rejected: {0}")]
    Validation(#[from] DecodeError),
    #[error("failed to render instructions: {0}")]
    Instruction(#[from] tera::Error),
    #[error("prompt store failed: {0:#}")]
    Store(#[from] anyhow::Error),
}

/// Errors surfaced to the UI-facing operations.
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt {0} not found")]
    NotFound(Uuid),
    #[error("{0} prompts regenerate automatically and cannot be regenerated on request")]
    NotRegenerable(PromptCategory),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}
