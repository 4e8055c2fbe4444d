use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{cutoff, EntrySource, ProfileSource, PromptStorage};
use crate::models::entry::recent_summaries;
use crate::models::{Entry, EntrySummary, NewPrompt, Prompt, PromptCategory, PromptType, UserProfile};

#[derive(Debug, Default)]
struct State {
    prompts: Vec<Prompt>,
    profiles: HashMap<Uuid, UserProfile>,
    entries: Vec<Entry>,
}

/// In-process store for local runs and tests. Also serves profiles and
/// entries so a single instance can back every collaborator seam.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: RwLock<State>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_profile(&self, user_id: Uuid, profile: UserProfile) {
        self.state.write().await.profiles.insert(user_id, profile);
    }

    pub async fn remove_profile(&self, user_id: &Uuid) {
        self.state.write().await.profiles.remove(user_id);
    }

    pub async fn add_entry(&self, entry: Entry) {
        self.state.write().await.entries.push(entry);
    }

    /// Stores a fully-formed record as is, e.g. one with backdated timestamps.
    pub async fn insert_prompt(&self, prompt: Prompt) {
        self.state.write().await.prompts.push(prompt);
    }

    pub async fn delete_prompt(&self, id: &Uuid) -> bool {
        let mut state = self.state.write().await;
        let before = state.prompts.len();
        state.prompts.retain(|p| p.id != *id);
        state.prompts.len() != before
    }

    /// Every record, active or not, in insertion order.
    pub async fn all_prompts(&self) -> Vec<Prompt> {
        self.state.read().await.prompts.clone()
    }

    async fn update<F>(&self, id: &Uuid, apply: F) -> bool
    where
        F: FnOnce(&mut Prompt),
    {
        let mut state = self.state.write().await;
        match state.prompts.iter_mut().find(|p| p.id == *id) {
            Some(prompt) => {
                apply(prompt);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl PromptStorage for MemoryStorage {
    async fn create_prompt(&self, prompt: NewPrompt) -> Result<Uuid> {
        let prompt = Prompt::new(prompt);
        let id = prompt.id;
        self.state.write().await.prompts.push(prompt);
        Ok(id)
    }

    async fn deactivate_prompts(&self, user_id: &Uuid, prompt_type: PromptType, category: PromptCategory) -> Result<u64> {
        let mut state = self.state.write().await;
        let mut changed = 0;
        for prompt in state
            .prompts
            .iter_mut()
            .filter(|p| p.is_active && p.matches(user_id, prompt_type, category))
        {
            prompt.deactivate();
            changed += 1;
        }
        Ok(changed)
    }

    async fn active_prompts(&self, user_id: &Uuid) -> Result<Vec<Prompt>> {
        let state = self.state.read().await;
        Ok(state
            .prompts
            .iter()
            .filter(|p| p.user_id == *user_id && p.is_active)
            .cloned()
            .collect())
    }

    async fn get_prompt(&self, id: &Uuid) -> Result<Option<Prompt>> {
        let state = self.state.read().await;
        Ok(state.prompts.iter().find(|p| p.id == *id).cloned())
    }

    async fn latest_version(&self, user_id: &Uuid, prompt_type: PromptType, category: PromptCategory) -> Result<Option<u32>> {
        let state = self.state.read().await;
        Ok(state
            .prompts
            .iter()
            .filter(|p| p.matches(user_id, prompt_type, category))
            .map(|p| p.metadata.version)
            .max())
    }

    async fn mark_shown(&self, id: &Uuid) -> Result<bool> {
        Ok(self.update(id, Prompt::record_shown).await)
    }

    async fn mark_used(&self, id: &Uuid) -> Result<bool> {
        Ok(self.update(id, Prompt::record_used).await)
    }

    async fn cleanup(&self, older_than_days: u32) -> Result<u64> {
        let cutoff = cutoff(older_than_days);
        let mut state = self.state.write().await;
        let before = state.prompts.len();
        state.prompts.retain(|p| p.is_active || p.updated_at >= cutoff);
        Ok((before - state.prompts.len()) as u64)
    }
}

#[async_trait]
impl ProfileSource for MemoryStorage {
    async fn get_profile(&self, user_id: &Uuid) -> Result<Option<UserProfile>> {
        Ok(self.state.read().await.profiles.get(user_id).cloned())
    }
}

#[async_trait]
impl EntrySource for MemoryStorage {
    async fn recent_entries(&self, user_id: &Uuid, limit: usize) -> Result<Vec<EntrySummary>> {
        let state = self.state.read().await;
        Ok(recent_summaries(&state.entries, user_id, limit))
    }

    async fn count_active_entries(&self, user_id: &Uuid) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state
            .entries
            .iter()
            .filter(|e| e.user_id == *user_id && e.is_active)
            .count() as u64)
    }
}
