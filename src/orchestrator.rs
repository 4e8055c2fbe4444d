//! Prompt generation workflows.
//!
//! Static, history-based and context-aware generation all run through
//! [`Orchestrator::generate_and_swap`]: call the generator, decode its
//! output, then deactivate the triple's old records and write the new ones.
//! What differs is the instruction, the decoder and what happens on
//! failure, which a [`Plan`] carries.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::GenerationConfig;
use crate::decode::{extract_prompt_list, extract_single_prompt, DecodeError};
use crate::error::GenerationError;
use crate::gateway::{GatewayError, Generation, GenerationRequest, TextGenerator};
use crate::instructions::{tail_chars, InstructionBuilder};
use crate::models::{MentorshipStyle, NewPrompt, PromptCategory, PromptMetadata, PromptType, UserProfile};
use crate::storage::{EntrySource, ProfileSource, PromptStorage};
use crate::templates;

type TripleKey = (Uuid, PromptType, PromptCategory);

/// One async lock per (user, type, category), so generate-and-swap on a
/// triple never interleaves with another run on the same triple.
#[derive(Debug, Default)]
pub struct TripleLocks {
    locks: Mutex<HashMap<TripleKey, Arc<AsyncMutex<()>>>>,
}

impl TripleLocks {
    pub async fn acquire(&self, key: TripleKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            // Drop locks nobody holds or waits on.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(key).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// How raw generator text becomes prompt strings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decoder {
    /// JSON array of prompts, truncated to `max`.
    PromptList { max: usize },
    /// One free-text prompt.
    SinglePrompt,
}

impl Decoder {
    fn decode(&self, text: &str) -> Result<Vec<String>, DecodeError> {
        match self {
            Decoder::PromptList { max } => {
                let mut prompts = extract_prompt_list(text)?;
                prompts.truncate(*max);
                Ok(prompts)
            }
            Decoder::SinglePrompt => extract_single_prompt(text).map(|p| vec![p]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FailurePolicy {
    /// Store the template bank's prompts for the style instead.
    TemplateFallback(MentorshipStyle),
    /// Leave whatever is active untouched.
    KeepPrevious,
}

/// Everything `generate_and_swap` needs for one triple.
#[derive(Debug)]
pub struct Plan {
    pub user_id: Uuid,
    pub prompt_type: PromptType,
    pub category: PromptCategory,
    pub request: Result<GenerationRequest, GenerationError>,
    pub decoder: Decoder,
    pub on_failure: FailurePolicy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    UserNotFound,
    NotEnoughEntries { found: usize, required: usize },
    DraftTooShort { chars: usize, required: usize },
}

/// Result of one workflow run for one triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Generated { stored: usize, version: u32 },
    FellBack { stored: usize, version: u32 },
    Skipped(SkipReason),
    Failed(String),
}

pub struct Orchestrator {
    prompts: Arc<dyn PromptStorage>,
    profiles: Arc<dyn ProfileSource>,
    entries: Arc<dyn EntrySource>,
    generator: Arc<dyn TextGenerator>,
    instructions: InstructionBuilder,
    config: GenerationConfig,
    locks: TripleLocks,
}

impl Orchestrator {
    pub fn new(
        prompts: Arc<dyn PromptStorage>,
        profiles: Arc<dyn ProfileSource>,
        entries: Arc<dyn EntrySource>,
        generator: Arc<dyn TextGenerator>,
        config: GenerationConfig,
    ) -> Result<Self, tera::Error> {
        Ok(Self {
            prompts,
            profiles,
            entries,
            generator,
            instructions: InstructionBuilder::new()?,
            config,
            locks: TripleLocks::default(),
        })
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Profile lookup with failures already mapped to an outcome.
    async fn load_profile(&self, user_id: &Uuid) -> Result<UserProfile, Outcome> {
        match self.profiles.get_profile(user_id).await {
            Ok(Some(profile)) => Ok(profile),
            Ok(None) => {
                warn!(%user_id, "User not found, skipping prompt generation");
                Err(Outcome::Skipped(SkipReason::UserNotFound))
            }
            Err(e) => {
                error!(%user_id, error = %format!("{e:#}"), "Failed to load user profile");
                Err(Outcome::Failed(GenerationError::Store(e).to_string()))
            }
        }
    }

    async fn call_generator(&self, request: GenerationRequest) -> Result<Generation, GatewayError> {
        let timeout = self.config.generation_timeout;
        match tokio::time::timeout(timeout, self.generator.generate(request)).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout(timeout)),
        }
    }

    async fn next_version(&self, key: &TripleKey) -> anyhow::Result<u32> {
        let (user_id, prompt_type, category) = key;
        let latest = self.prompts.latest_version(user_id, *prompt_type, *category).await?;
        Ok(latest.map_or(1, |v| v + 1))
    }

    /// Deactivates the triple, then writes one record per text.
    async fn swap(&self, key: &TripleKey, texts: Vec<String>, metadata: PromptMetadata) -> anyhow::Result<usize> {
        let (user_id, prompt_type, category) = *key;
        let replaced = self.prompts.deactivate_prompts(&user_id, prompt_type, category).await?;
        debug!(%user_id, %prompt_type, %category, replaced, "Deactivated previous prompts");

        let mut stored = 0;
        for prompt_text in texts {
            self.prompts
                .create_prompt(NewPrompt {
                    user_id,
                    prompt_type,
                    prompt_category: category,
                    prompt_text,
                    metadata: metadata.clone(),
                })
                .await?;
            stored += 1;
        }
        Ok(stored)
    }

    async fn attempt(
        &self,
        key: &TripleKey,
        request: Result<GenerationRequest, GenerationError>,
        decoder: Decoder,
        version: u32,
    ) -> Result<usize, GenerationError> {
        let generation = self.call_generator(request?).await?;
        let texts = decoder.decode(&generation.text)?;
        let metadata = PromptMetadata {
            model: generation.model,
            tokens_used: generation.tokens_used,
            generated_at: Utc::now(),
            version,
        };
        Ok(self.swap(key, texts, metadata).await?)
    }

    /// Shared skeleton of every workflow. Never returns an error: failures
    /// are logged and turned into an [`Outcome`].
    #[instrument(skip(self, plan), fields(user_id = %plan.user_id, prompt_type = %plan.prompt_type, category = %plan.category))]
    pub async fn generate_and_swap(&self, plan: Plan) -> Outcome {
        let key = (plan.user_id, plan.prompt_type, plan.category);
        let _guard = self.locks.acquire(key).await;

        let version = match self.next_version(&key).await {
            Ok(version) => version,
            Err(e) => {
                error!(error = %format!("{e:#}"), "Failed to read prompt version");
                return Outcome::Failed(GenerationError::Store(e).to_string());
            }
        };

        let err = match self.attempt(&key, plan.request, plan.decoder, version).await {
            Ok(stored) => {
                info!(stored, version, "Stored generated prompts");
                return Outcome::Generated { stored, version };
            }
            Err(err) => err,
        };

        match (plan.on_failure, err) {
            (_, err @ GenerationError::Store(_)) => {
                error!(error = %err, "Prompt store failed mid-swap");
                Outcome::Failed(err.to_string())
            }
            (FailurePolicy::TemplateFallback(style), err) => {
                warn!(error = %err, %style, "Generation failed, storing template prompts");
                let texts = templates::get_templates(plan.prompt_type, style)
                    .iter()
                    .map(|t| t.to_string())
                    .collect();
                match self.swap(&key, texts, PromptMetadata::template(version)).await {
                    Ok(stored) => Outcome::FellBack { stored, version },
                    Err(e) => {
                        error!(error = %format!("{e:#}"), "Failed to store template prompts");
                        Outcome::Failed(GenerationError::Store(e).to_string())
                    }
                }
            }
            (FailurePolicy::KeepPrevious, err) => {
                warn!(error = %err, "Generation failed, keeping previous prompts");
                Outcome::Failed(err.to_string())
            }
        }
    }

    fn static_plan(&self, user_id: Uuid, profile: &UserProfile, prompt_type: PromptType, fresh: bool) -> Plan {
        let count = self.config.static_prompt_count;
        Plan {
            user_id,
            prompt_type,
            category: PromptCategory::Static,
            request: self
                .instructions
                .static_prompts(profile, prompt_type, count, fresh)
                .map(GenerationRequest::new)
                .map_err(GenerationError::from),
            decoder: Decoder::PromptList { max: count },
            on_failure: if fresh {
                FailurePolicy::KeepPrevious
            } else {
                FailurePolicy::TemplateFallback(profile.style())
            },
        }
    }

    /// Static prompts for every type, one type at a time. Falls back to
    /// templates per type, so each attempted type ends up with prompts.
    #[instrument(skip(self))]
    pub async fn generate_static_prompts(&self, user_id: Uuid) -> Vec<(PromptType, Outcome)> {
        let profile = match self.load_profile(&user_id).await {
            Ok(profile) => profile,
            Err(outcome) => return PromptType::ALL.iter().map(|t| (*t, outcome.clone())).collect(),
        };

        let mut outcomes = Vec::with_capacity(PromptType::ALL.len());
        for prompt_type in PromptType::ALL {
            let plan = self.static_plan(user_id, &profile, prompt_type, false);
            outcomes.push((prompt_type, self.generate_and_swap(plan).await));
        }
        info!(%user_id, "Completed static prompt generation");
        outcomes
    }

    /// Replaces one type's static set. The old set stays active unless a
    /// new one was generated and decoded.
    #[instrument(skip(self))]
    pub async fn regenerate_static_prompts(&self, user_id: Uuid, prompt_type: PromptType) -> Outcome {
        match self.load_profile(&user_id).await {
            Ok(profile) => {
                let plan = self.static_plan(user_id, &profile, prompt_type, true);
                self.generate_and_swap(plan).await
            }
            Err(outcome) => outcome,
        }
    }

    /// One prompt built from the user's recent entries. A silent no-op
    /// until the user has enough active entries.
    #[instrument(skip(self))]
    pub async fn generate_history_prompt(&self, user_id: Uuid, prompt_type: PromptType) -> Outcome {
        let profile = match self.load_profile(&user_id).await {
            Ok(profile) => profile,
            Err(outcome) => return outcome,
        };

        let entries = match self.entries.recent_entries(&user_id, self.config.history_lookback).await {
            Ok(entries) => entries,
            Err(e) => {
                error!(%user_id, error = %format!("{e:#}"), "Failed to load recent entries");
                return Outcome::Failed(GenerationError::Store(e).to_string());
            }
        };

        let required = self.config.history_entry_threshold;
        if entries.len() < required {
            debug!(%user_id, found = entries.len(), required, "Not enough entries for a history prompt");
            return Outcome::Skipped(SkipReason::NotEnoughEntries {
                found: entries.len(),
                required,
            });
        }

        let request = self
            .instructions
            .history_prompt(
                &profile,
                prompt_type,
                &entries,
                self.config.history_summary_count,
                self.config.history_preview_chars,
            )
            .map(|messages| GenerationRequest::new(messages).with_analysis(entries))
            .map_err(GenerationError::from);

        self.generate_and_swap(Plan {
            user_id,
            prompt_type,
            category: PromptCategory::HistoryBased,
            request,
            decoder: Decoder::SinglePrompt,
            on_failure: FailurePolicy::KeepPrevious,
        })
        .await
    }

    /// One prompt about the draft being written right now.
    #[instrument(skip(self, draft), fields(draft_chars = tracing::field::Empty))]
    pub async fn generate_context_prompt(&self, user_id: Uuid, prompt_type: PromptType, draft: &str) -> Outcome {
        let chars = draft.chars().count();
        tracing::Span::current().record("draft_chars", chars);
        let required = self.config.context_min_chars;
        if chars < required {
            debug!(%user_id, chars, required, "Draft too short for a context prompt");
            return Outcome::Skipped(SkipReason::DraftTooShort { chars, required });
        }

        let profile = match self.load_profile(&user_id).await {
            Ok(profile) => profile,
            Err(outcome) => return outcome,
        };

        let tail = tail_chars(draft, self.config.context_tail_chars);
        let request = self
            .instructions
            .context_prompt(&profile, prompt_type, tail)
            .map(GenerationRequest::new)
            .map_err(GenerationError::from);

        self.generate_and_swap(Plan {
            user_id,
            prompt_type,
            category: PromptCategory::ContextAware,
            request,
            decoder: Decoder::SinglePrompt,
            on_failure: FailurePolicy::KeepPrevious,
        })
        .await
    }
}
