pub mod analysis;
pub mod api;
pub mod config;
pub mod decode;
pub mod error;
pub mod gateway;
pub mod instructions;
pub mod models;
pub mod orchestrator;
pub mod scheduler;
pub mod service;
pub mod storage;
pub mod templates;
pub mod triggers;

pub use config::{GenerationConfig, SessionConfig};
pub use error::{GenerationError, PromptError};
pub use orchestrator::{Orchestrator, Outcome, SkipReason};
pub use scheduler::{GenerationJob, Scheduler};
pub use service::PromptService;
