mod common;

use chrono::Utc;
use common::{add_entries, user, ScriptedGenerator};
use journal_prompts::models::{MentorshipStyle, NewPrompt, Prompt, PromptCategory, PromptMetadata, PromptType};
use journal_prompts::scheduler::{spawn_cleanup, spawn_workers};
use journal_prompts::storage::{MemoryStorage, PromptStorage};
use journal_prompts::{GenerationJob, Scheduler};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn workers_drain_the_queue_and_stop_when_senders_drop() {
    let store = Arc::new(MemoryStorage::new());
    let user_id = user(&store, MentorshipStyle::Reflective).await;
    add_entries(&store, user_id, 5).await;
    let generator = ScriptedGenerator::always("What would you do differently?");
    let orchestrator = Arc::new(common::orchestrator(&store, generator.clone()));

    let (scheduler, rx) = Scheduler::channel();
    let workers = spawn_workers(orchestrator, rx, 3);
    for prompt_type in PromptType::ALL {
        scheduler.submit(GenerationJob::History { user_id, prompt_type });
    }
    drop(scheduler);
    for worker in workers {
        worker.await.unwrap();
    }

    assert_eq!(generator.calls(), 4);
    let grid = store.active_prompt_grid(&user_id).await.unwrap();
    for prompt_type in PromptType::ALL {
        assert_eq!(grid.get(prompt_type, PromptCategory::HistoryBased).len(), 1);
    }
}

#[tokio::test]
async fn zero_workers_still_spawns_one() {
    let store = Arc::new(MemoryStorage::new());
    let orchestrator = Arc::new(common::orchestrator(&store, ScriptedGenerator::failing()));
    let (_scheduler, rx) = Scheduler::channel();
    let workers = spawn_workers(orchestrator, rx, 0);
    assert_eq!(workers.len(), 1);
    for worker in workers {
        worker.abort();
    }
}

#[tokio::test(start_paused = true)]
async fn periodic_cleanup_removes_stale_inactive_prompts() {
    let store = Arc::new(MemoryStorage::new());
    let user_id = user(&store, MentorshipStyle::Reflective).await;
    let new_prompt = |text: &str| NewPrompt {
        user_id,
        prompt_type: PromptType::Reflection,
        prompt_category: PromptCategory::Static,
        prompt_text: text.to_string(),
        metadata: PromptMetadata::template(1),
    };
    let mut stale = Prompt::new(new_prompt("stale"));
    stale.is_active = false;
    stale.updated_at = Utc::now() - chrono::Duration::days(45);
    let mut old_but_active = Prompt::new(new_prompt("active"));
    old_but_active.updated_at = Utc::now() - chrono::Duration::days(45);
    store.insert_prompt(stale).await;
    store.insert_prompt(old_but_active.clone()).await;

    let handle = spawn_cleanup(store.clone(), Duration::from_secs(60), 30);
    tokio::time::sleep(Duration::from_millis(10)).await;
    handle.abort();

    let remaining = store.all_prompts().await;
    assert_eq!(remaining, vec![old_but_active]);
}
