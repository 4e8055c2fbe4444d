#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use journal_prompts::gateway::{GatewayError, Generation, GenerationRequest, TextGenerator};
use journal_prompts::models::{Entry, ExperienceLevel, MentorshipStyle, UserProfile};
use journal_prompts::storage::MemoryStorage;
use journal_prompts::{GenerationConfig, Orchestrator};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Fail,
}

/// Answers from a script, repeating the last reply once the script runs
/// out. Records every request it sees.
#[derive(Debug)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn always(text: &str) -> Arc<Self> {
        Self::new([Reply::Text(text.to_string())])
    }

    pub fn failing() -> Arc<Self> {
        Self::new([Reply::Fail])
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, GatewayError> {
        self.requests.lock().unwrap().push(request);
        let reply = {
            let mut replies = self.replies.lock().unwrap();
            if replies.len() > 1 {
                replies.pop_front()
            } else {
                replies.front().cloned()
            }
        };
        match reply {
            Some(Reply::Text(text)) => Ok(Generation {
                text,
                model: "gpt-4o".to_string(),
                tokens_used: 42,
            }),
            Some(Reply::Fail) | None => Err(GatewayError::Status {
                status: 503,
                body: "unavailable".to_string(),
            }),
        }
    }
}

pub fn profile(style: MentorshipStyle) -> UserProfile {
    UserProfile {
        current_role: Some("Backend engineer".to_string()),
        experience_level: Some(ExperienceLevel::MidLevel),
        mentorship_style: Some(style),
        development_goals: vec!["Own a service end to end".to_string()],
        tech_stack: vec!["Rust".to_string(), "Postgres".to_string()],
        is_onboarded: true,
    }
}

pub async fn user(store: &MemoryStorage, style: MentorshipStyle) -> Uuid {
    let user_id = Uuid::new_v4();
    store.put_profile(user_id, profile(style)).await;
    user_id
}

pub async fn add_entries(store: &MemoryStorage, user_id: Uuid, count: u32) {
    for day in 1..=count {
        let date = NaiveDate::from_ymd_opt(2024, 5, day).unwrap();
        let text = format!("Day {day}: debugged a flaky deployment and wrote tests for the retry logic.");
        store.add_entry(Entry::new(user_id, date, text)).await;
    }
}

pub fn orchestrator(store: &Arc<MemoryStorage>, generator: Arc<ScriptedGenerator>) -> Orchestrator {
    Orchestrator::new(
        store.clone(),
        store.clone(),
        store.clone(),
        generator,
        GenerationConfig::default(),
    )
    .unwrap()
}
