mod common;

use async_trait::async_trait;
use common::{add_entries, orchestrator, user, Reply, ScriptedGenerator};
use journal_prompts::gateway::{GatewayError, Generation, GenerationRequest, TextGenerator};
use journal_prompts::models::{MentorshipStyle, NewPrompt, Prompt, PromptCategory, PromptMetadata, PromptType};
use journal_prompts::storage::{MemoryStorage, PromptStorage};
use journal_prompts::{GenerationConfig, Orchestrator, Outcome, SkipReason};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const TWO_PROMPTS: &str = r#"[{"prompt":"A"},{"prompt":"B"}]"#;

async fn active_texts(store: &MemoryStorage, user_id: &Uuid, t: PromptType, c: PromptCategory) -> Vec<String> {
    store
        .active_prompts_for(user_id, t, c)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.prompt_text)
        .collect()
}

#[tokio::test]
async fn failing_gateway_leaves_template_prompts_for_every_type() {
    let store = Arc::new(MemoryStorage::new());
    let user_id = user(&store, MentorshipStyle::Structured).await;
    let generator = ScriptedGenerator::failing();
    let orchestrator = orchestrator(&store, generator.clone());

    let outcomes = orchestrator.generate_static_prompts(user_id).await;

    assert_eq!(generator.calls(), 4);
    assert_eq!(outcomes.len(), 4);
    for (_, outcome) in &outcomes {
        assert_eq!(outcome, &Outcome::FellBack { stored: 2, version: 1 });
    }
    let grid = store.active_prompt_grid(&user_id).await.unwrap();
    assert_eq!(grid.len(), 8);
    for prompt_type in PromptType::ALL {
        let cell = grid.get(prompt_type, PromptCategory::Static);
        assert_eq!(cell.len(), 2);
        for prompt in cell {
            assert_eq!(prompt.metadata.model, PromptMetadata::TEMPLATE_MODEL);
            assert_eq!(prompt.metadata.tokens_used, 0);
        }
    }
}

#[tokio::test]
async fn static_generation_extracts_the_array_from_prose() {
    let store = Arc::new(MemoryStorage::new());
    let user_id = user(&store, MentorshipStyle::Exploratory).await;
    let generator = ScriptedGenerator::always("Here you go:\n[{\"prompt\":\"A\"},{\"prompt\":\"B\"}]\nEnjoy!");
    let orchestrator = orchestrator(&store, generator);

    let outcomes = orchestrator.generate_static_prompts(user_id).await;

    assert!(outcomes
        .iter()
        .all(|(_, o)| *o == Outcome::Generated { stored: 2, version: 1 }));
    let texts = active_texts(&store, &user_id, PromptType::Reflection, PromptCategory::Static).await;
    assert_eq!(texts, vec!["A", "B"]);
    let prompt = &store.active_prompts(&user_id).await.unwrap()[0];
    assert_eq!(prompt.metadata.model, "gpt-4o");
    assert_eq!(prompt.metadata.tokens_used, 42);
}

#[tokio::test]
async fn regeneration_swaps_the_static_set_and_bumps_the_version() {
    let store = Arc::new(MemoryStorage::new());
    let user_id = user(&store, MentorshipStyle::Reflective).await;
    let generator = ScriptedGenerator::new([
        Reply::Text(TWO_PROMPTS.to_string()),
        Reply::Text(TWO_PROMPTS.to_string()),
        Reply::Text(TWO_PROMPTS.to_string()),
        Reply::Text(TWO_PROMPTS.to_string()),
        Reply::Text(r#"[{"prompt":"C"},{"prompt":"D"}]"#.to_string()),
    ]);
    let orchestrator = orchestrator(&store, generator.clone());
    orchestrator.generate_static_prompts(user_id).await;

    let outcome = orchestrator
        .regenerate_static_prompts(user_id, PromptType::CareerGrowth)
        .await;

    assert_eq!(outcome, Outcome::Generated { stored: 2, version: 2 });
    let active = store
        .active_prompts_for(&user_id, PromptType::CareerGrowth, PromptCategory::Static)
        .await
        .unwrap();
    assert_eq!(active.len(), 2);
    assert!(active.iter().all(|p| p.metadata.version == 2));
    let texts: Vec<_> = active.iter().map(|p| p.prompt_text.as_str()).collect();
    assert_eq!(texts, vec!["C", "D"]);

    let history: Vec<_> = store
        .all_prompts()
        .await
        .into_iter()
        .filter(|p| p.matches(&user_id, PromptType::CareerGrowth, PromptCategory::Static))
        .collect();
    assert_eq!(history.len(), 4);
    assert_eq!(history.iter().filter(|p| !p.is_active).count(), 2);
    assert!(history.iter().filter(|p| !p.is_active).all(|p| p.metadata.version == 1));

    // The regeneration asked for fresh wording.
    let last = generator.requests().pop().unwrap();
    assert!(last.messages[1].content.contains("fresh career-growth prompts"));
}

#[tokio::test]
async fn failed_regeneration_keeps_the_previous_set() {
    let store = Arc::new(MemoryStorage::new());
    let user_id = user(&store, MentorshipStyle::Reflective).await;
    let generator = ScriptedGenerator::new([
        Reply::Text(TWO_PROMPTS.to_string()),
        Reply::Text(TWO_PROMPTS.to_string()),
        Reply::Text(TWO_PROMPTS.to_string()),
        Reply::Text(TWO_PROMPTS.to_string()),
        Reply::Text("Sorry, I can't help with that.".to_string()),
    ]);
    let orchestrator = orchestrator(&store, generator);
    orchestrator.generate_static_prompts(user_id).await;

    let outcome = orchestrator
        .regenerate_static_prompts(user_id, PromptType::CareerGrowth)
        .await;

    assert!(matches!(outcome, Outcome::Failed(_)));
    let texts = active_texts(&store, &user_id, PromptType::CareerGrowth, PromptCategory::Static).await;
    assert_eq!(texts, vec!["A", "B"]);
}

#[tokio::test]
async fn history_prompt_after_five_entries() {
    let store = Arc::new(MemoryStorage::new());
    let user_id = user(&store, MentorshipStyle::ChallengeDriven).await;
    add_entries(&store, user_id, 5).await;
    let generator = ScriptedGenerator::always("What pattern emerged this week?");
    let orchestrator = orchestrator(&store, generator.clone());

    for prompt_type in PromptType::ALL {
        orchestrator.generate_history_prompt(user_id, prompt_type).await;
    }

    let active = store
        .active_prompts_for(&user_id, PromptType::Reflection, PromptCategory::HistoryBased)
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].prompt_text, "What pattern emerged this week?");
    assert_eq!(active[0].metadata.version, 1);

    let request = &generator.requests()[0];
    assert_eq!(request.analysis.as_ref().map(Vec::len), Some(5));
    assert!(request.messages[1].content.contains("Entry 1 (2024-05-05)"));
}

#[tokio::test]
async fn repeated_history_generation_keeps_one_active_prompt() {
    let store = Arc::new(MemoryStorage::new());
    let user_id = user(&store, MentorshipStyle::Reflective).await;
    add_entries(&store, user_id, 6).await;
    let generator = ScriptedGenerator::new([
        Reply::Text("First?".to_string()),
        Reply::Text("Second?".to_string()),
        Reply::Text("Third?".to_string()),
    ]);
    let orchestrator = orchestrator(&store, generator);

    for _ in 0..3 {
        orchestrator
            .generate_history_prompt(user_id, PromptType::SkillDevelopment)
            .await;
    }

    let active = store
        .active_prompts_for(&user_id, PromptType::SkillDevelopment, PromptCategory::HistoryBased)
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].prompt_text, "Third?");
    assert_eq!(active[0].metadata.version, 3);
}

#[tokio::test]
async fn concurrent_runs_on_one_triple_never_leave_two_active() {
    let store = Arc::new(MemoryStorage::new());
    let user_id = user(&store, MentorshipStyle::Reflective).await;
    add_entries(&store, user_id, 5).await;
    let orchestrator = Arc::new(orchestrator(&store, ScriptedGenerator::always("Why?")));

    let (a, b) = tokio::join!(
        orchestrator.generate_history_prompt(user_id, PromptType::Reflection),
        orchestrator.generate_history_prompt(user_id, PromptType::Reflection),
    );

    let mut outcomes = vec![a, b];
    outcomes.sort_by_key(|o| format!("{o:?}"));
    assert_eq!(
        outcomes,
        vec![
            Outcome::Generated { stored: 1, version: 1 },
            Outcome::Generated { stored: 1, version: 2 },
        ]
    );
    let active = store
        .active_prompts_for(&user_id, PromptType::Reflection, PromptCategory::HistoryBased)
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
}

#[tokio::test]
async fn failures_without_fallback_leave_state_untouched() {
    let store = Arc::new(MemoryStorage::new());
    let user_id = user(&store, MentorshipStyle::Reflective).await;
    add_entries(&store, user_id, 5).await;

    let ok = orchestrator(&store, ScriptedGenerator::always("Still stuck on anything?"));
    ok.generate_history_prompt(user_id, PromptType::DailyCheckin).await;
    let before = store.all_prompts().await;

    let failing = orchestrator(&store, ScriptedGenerator::failing());
    let history = failing.generate_history_prompt(user_id, PromptType::DailyCheckin).await;
    let context = failing
        .generate_context_prompt(user_id, PromptType::DailyCheckin, &"x".repeat(300))
        .await;

    assert!(matches!(history, Outcome::Failed(_)));
    assert!(matches!(context, Outcome::Failed(_)));
    assert_eq!(store.all_prompts().await, before);
}

#[tokio::test]
async fn history_below_threshold_writes_nothing() {
    let store = Arc::new(MemoryStorage::new());
    let user_id = user(&store, MentorshipStyle::Reflective).await;
    add_entries(&store, user_id, 4).await;
    let generator = ScriptedGenerator::always("Never used");
    let orchestrator = orchestrator(&store, generator.clone());

    let outcome = orchestrator.generate_history_prompt(user_id, PromptType::Reflection).await;

    assert_eq!(
        outcome,
        Outcome::Skipped(SkipReason::NotEnoughEntries { found: 4, required: 5 })
    );
    assert_eq!(generator.calls(), 0);
    assert!(store.all_prompts().await.is_empty());
}

#[tokio::test]
async fn context_prompt_strips_quotes_and_bold() {
    let store = Arc::new(MemoryStorage::new());
    let user_id = user(&store, MentorshipStyle::Reflective).await;
    let orchestrator = orchestrator(&store, ScriptedGenerator::always("**\"What did you ship today?\"**"));

    let outcome = orchestrator
        .generate_context_prompt(user_id, PromptType::Reflection, &"y".repeat(120))
        .await;

    assert_eq!(outcome, Outcome::Generated { stored: 1, version: 1 });
    let texts = active_texts(&store, &user_id, PromptType::Reflection, PromptCategory::ContextAware).await;
    assert_eq!(texts, vec!["What did you ship today?"]);
}

#[tokio::test]
async fn context_prompt_skips_short_drafts() {
    let store = Arc::new(MemoryStorage::new());
    let user_id = user(&store, MentorshipStyle::Reflective).await;
    let generator = ScriptedGenerator::always("Unused");
    let orchestrator = orchestrator(&store, generator.clone());

    let outcome = orchestrator
        .generate_context_prompt(user_id, PromptType::Reflection, &"z".repeat(99))
        .await;

    assert_eq!(
        outcome,
        Outcome::Skipped(SkipReason::DraftTooShort { chars: 99, required: 100 })
    );
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn context_prompt_sends_the_end_of_the_draft() {
    let store = Arc::new(MemoryStorage::new());
    let user_id = user(&store, MentorshipStyle::Reflective).await;
    let generator = ScriptedGenerator::always("Go deeper?");
    let orchestrator = orchestrator(&store, generator.clone());
    let draft = format!("{}{}", "h".repeat(300), "t".repeat(500));

    orchestrator
        .generate_context_prompt(user_id, PromptType::CareerGrowth, &draft)
        .await;

    let content = &generator.requests()[0].messages[1].content;
    assert!(content.contains(&"t".repeat(500)));
    assert!(!content.contains(&"h".repeat(10)));
}

#[tokio::test]
async fn unknown_user_is_skipped_everywhere() {
    let store = Arc::new(MemoryStorage::new());
    let generator = ScriptedGenerator::always(TWO_PROMPTS);
    let orchestrator = orchestrator(&store, generator.clone());
    let user_id = Uuid::new_v4();

    let outcomes = orchestrator.generate_static_prompts(user_id).await;
    assert!(outcomes
        .iter()
        .all(|(_, o)| *o == Outcome::Skipped(SkipReason::UserNotFound)));
    assert_eq!(
        orchestrator.regenerate_static_prompts(user_id, PromptType::Reflection).await,
        Outcome::Skipped(SkipReason::UserNotFound)
    );
    assert_eq!(generator.calls(), 0);
    assert!(store.all_prompts().await.is_empty());
}

struct StalledGenerator;

#[async_trait]
impl TextGenerator for StalledGenerator {
    async fn generate(&self, _request: GenerationRequest) -> Result<Generation, GatewayError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(GatewayError::Empty)
    }
}

#[tokio::test(start_paused = true)]
async fn timed_out_generation_falls_back_to_templates() {
    let store = Arc::new(MemoryStorage::new());
    let user_id = user(&store, MentorshipStyle::Structured).await;
    let orchestrator = Orchestrator::new(
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(StalledGenerator),
        GenerationConfig::default(),
    )
    .unwrap();

    let outcomes = orchestrator.generate_static_prompts(user_id).await;

    assert!(outcomes
        .iter()
        .all(|(_, o)| *o == Outcome::FellBack { stored: 2, version: 1 }));
}

/// Delegates to memory storage, but every write of a new prompt fails.
struct FullDisk(Arc<MemoryStorage>);

#[async_trait]
impl PromptStorage for FullDisk {
    async fn create_prompt(&self, _prompt: NewPrompt) -> anyhow::Result<Uuid> {
        anyhow::bail!("disk full")
    }

    async fn deactivate_prompts(&self, user_id: &Uuid, prompt_type: PromptType, category: PromptCategory) -> anyhow::Result<u64> {
        self.0.deactivate_prompts(user_id, prompt_type, category).await
    }

    async fn active_prompts(&self, user_id: &Uuid) -> anyhow::Result<Vec<Prompt>> {
        self.0.active_prompts(user_id).await
    }

    async fn get_prompt(&self, id: &Uuid) -> anyhow::Result<Option<Prompt>> {
        self.0.get_prompt(id).await
    }

    async fn latest_version(&self, user_id: &Uuid, prompt_type: PromptType, category: PromptCategory) -> anyhow::Result<Option<u32>> {
        self.0.latest_version(user_id, prompt_type, category).await
    }

    async fn mark_shown(&self, id: &Uuid) -> anyhow::Result<bool> {
        self.0.mark_shown(id).await
    }

    async fn mark_used(&self, id: &Uuid) -> anyhow::Result<bool> {
        self.0.mark_used(id).await
    }

    async fn cleanup(&self, older_than_days: u32) -> anyhow::Result<u64> {
        self.0.cleanup(older_than_days).await
    }
}

#[tokio::test]
async fn store_failure_never_falls_back_to_templates() {
    let store = Arc::new(MemoryStorage::new());
    let user_id = user(&store, MentorshipStyle::Structured).await;
    let generator = ScriptedGenerator::always(TWO_PROMPTS);
    let orchestrator = Orchestrator::new(
        Arc::new(FullDisk(store.clone())),
        store.clone(),
        store.clone(),
        generator.clone(),
        GenerationConfig::default(),
    )
    .unwrap();

    let outcomes = orchestrator.generate_static_prompts(user_id).await;

    assert_eq!(generator.calls(), 4);
    for (_, outcome) in &outcomes {
        match outcome {
            Outcome::Failed(reason) => assert!(reason.contains("disk full"), "{reason}"),
            other => panic!("expected a store failure, got {other:?}"),
        }
    }
    assert!(store.all_prompts().await.is_empty());
}
