use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{EntrySummary, NewPrompt, Prompt, PromptCategory, PromptGrid, PromptType, UserProfile};

pub mod filesystem;
pub mod memory;
pub mod postgres;

pub use filesystem::FileSystemStorage;
pub use memory::MemoryStorage;
pub use postgres::PostgresStorage;

/// Persistent collection of prompt records. Deliberately dumb: callers own
/// the "deactivate before create" ordering.
#[async_trait]
pub trait PromptStorage: Send + Sync + 'static { // Ensure Send + Sync for Arc<dyn T>
    /// Appends a new active record and returns its ID. No uniqueness check.
    async fn create_prompt(&self, prompt: NewPrompt) -> Result<Uuid>;

    /// Deactivates every active record of the triple. Returns how many
    /// records changed; zero is not an error.
    async fn deactivate_prompts(&self, user_id: &Uuid, prompt_type: PromptType, category: PromptCategory) -> Result<u64>;

    /// All active prompts of a user, in creation order.
    async fn active_prompts(&self, user_id: &Uuid) -> Result<Vec<Prompt>>;

    async fn get_prompt(&self, id: &Uuid) -> Result<Option<Prompt>>;

    /// Highest version stored for the triple, active or not.
    async fn latest_version(&self, user_id: &Uuid, prompt_type: PromptType, category: PromptCategory) -> Result<Option<u32>>;

    /// Bumps the impression counter. Returns false if the prompt is gone.
    async fn mark_shown(&self, id: &Uuid) -> Result<bool>;

    /// Bumps the usage counter. Returns false if the prompt is gone.
    async fn mark_used(&self, id: &Uuid) -> Result<bool>;

    /// Physically deletes inactive records last updated more than
    /// `older_than_days` ago. Returns the number deleted.
    async fn cleanup(&self, older_than_days: u32) -> Result<u64>;

    async fn active_prompt_grid(&self, user_id: &Uuid) -> Result<PromptGrid> {
        Ok(PromptGrid::from_prompts(self.active_prompts(user_id).await?))
    }

    async fn active_prompts_for(&self, user_id: &Uuid, prompt_type: PromptType, category: PromptCategory) -> Result<Vec<Prompt>> {
        let prompts = self.active_prompts(user_id).await?;
        Ok(prompts
            .into_iter()
            .filter(|p| p.matches(user_id, prompt_type, category))
            .collect())
    }
}

/// Read access to onboarding profiles.
#[async_trait]
pub trait ProfileSource: Send + Sync + 'static {
    /// `None` when the user does not exist.
    async fn get_profile(&self, user_id: &Uuid) -> Result<Option<UserProfile>>;
}

/// Read access to journal entries.
#[async_trait]
pub trait EntrySource: Send + Sync + 'static {
    /// Active entries, newest entry date first.
    async fn recent_entries(&self, user_id: &Uuid, limit: usize) -> Result<Vec<EntrySummary>>;

    async fn count_active_entries(&self, user_id: &Uuid) -> Result<u64>;
}

pub(crate) fn cutoff(older_than_days: u32) -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now() - chrono::Duration::days(i64::from(older_than_days))
}
