//! The surface collaborators call: onboarding, the entry editor and the
//! prompts panel. Generation is always queued, never awaited here.

use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::GenerationConfig;
use crate::error::PromptError;
use crate::models::{Prompt, PromptCategory, PromptGrid, PromptType};
use crate::scheduler::{GenerationJob, Scheduler};
use crate::storage::{EntrySource, PromptStorage};
use crate::triggers::{crosses_history_threshold, SessionRegistry};

pub struct PromptService {
    prompts: Arc<dyn PromptStorage>,
    entries: Arc<dyn EntrySource>,
    scheduler: Scheduler,
    sessions: SessionRegistry,
    history_entry_threshold: usize,
}

impl PromptService {
    pub fn new(
        prompts: Arc<dyn PromptStorage>,
        entries: Arc<dyn EntrySource>,
        scheduler: Scheduler,
        sessions: SessionRegistry,
        config: &GenerationConfig,
    ) -> Self {
        Self {
            prompts,
            entries,
            scheduler,
            sessions,
            history_entry_threshold: config.history_entry_threshold,
        }
    }

    #[instrument(skip(self))]
    pub fn on_onboarding_complete(&self, user_id: Uuid) {
        info!("Onboarding complete, queueing static prompts");
        self.scheduler.submit(GenerationJob::Static { user_id });
    }

    pub fn on_entry_count_reaches_five(&self, user_id: Uuid) {
        info!(%user_id, "Entry threshold reached, queueing history prompts");
        for prompt_type in PromptType::ALL {
            self.scheduler.submit(GenerationJob::History { user_id, prompt_type });
        }
    }

    /// Called after an entry is persisted. Returns whether history
    /// generation was queued.
    #[instrument(skip(self))]
    pub async fn on_entry_saved(&self, user_id: Uuid) -> Result<bool, PromptError> {
        let count = self.entries.count_active_entries(&user_id).await?;
        debug!(count, "Active entries after save");
        if !crosses_history_threshold(count, self.history_entry_threshold) {
            return Ok(false);
        }
        self.on_entry_count_reaches_five(user_id);
        Ok(true)
    }

    pub fn on_draft_content_changed(&self, user_id: Uuid, active_type: PromptType, draft: String) {
        self.sessions.draft_changed(user_id, active_type, draft);
    }

    pub fn on_panel_changed(&self, user_id: Uuid, open: bool, active_type: Option<PromptType>) {
        self.sessions.panel_changed(user_id, open, active_type);
    }

    /// Queues a user-requested regeneration. Context-aware prompts follow
    /// the draft and are refused.
    #[instrument(skip(self))]
    pub fn regenerate(&self, user_id: Uuid, prompt_type: PromptType, category: PromptCategory) -> Result<(), PromptError> {
        let job = match category {
            PromptCategory::Static => GenerationJob::RegenerateStatic { user_id, prompt_type },
            PromptCategory::HistoryBased => GenerationJob::History { user_id, prompt_type },
            PromptCategory::ContextAware => {
                warn!("Refusing to regenerate context-aware prompts");
                return Err(PromptError::NotRegenerable(category));
            }
        };
        self.scheduler.submit(job);
        Ok(())
    }

    pub async fn list_active_prompts(&self, user_id: &Uuid) -> Result<PromptGrid, PromptError> {
        Ok(self.prompts.active_prompt_grid(user_id).await?)
    }

    /// Active prompts of one type across every category, oldest first.
    pub async fn list_active_prompts_by_type(&self, user_id: &Uuid, prompt_type: PromptType) -> Result<Vec<Prompt>, PromptError> {
        let prompts = self.prompts.active_prompts(user_id).await?;
        Ok(prompts
            .into_iter()
            .filter(|p| p.prompt_type == prompt_type)
            .collect())
    }

    /// Impressions are best effort; a vanished prompt is ignored.
    pub async fn record_shown(&self, prompt_id: &Uuid) -> Result<(), PromptError> {
        if !self.prompts.mark_shown(prompt_id).await? {
            debug!(%prompt_id, "Shown prompt no longer exists");
        }
        Ok(())
    }

    pub async fn record_used(&self, prompt_id: &Uuid) -> Result<(), PromptError> {
        if self.prompts.mark_used(prompt_id).await? {
            Ok(())
        } else {
            Err(PromptError::NotFound(*prompt_id))
        }
    }

    pub async fn cleanup(&self, older_than_days: u32) -> Result<u64, PromptError> {
        let deleted = self.prompts.cleanup(older_than_days).await?;
        info!(deleted, older_than_days, "Cleaned up inactive prompts");
        Ok(deleted)
    }
}
