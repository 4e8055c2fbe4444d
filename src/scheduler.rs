//! Background execution of generation work.
//!
//! Triggers never wait on the generator. They submit a [`GenerationJob`] and
//! return; a small pool of workers drains the queue.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::PromptType;
use crate::orchestrator::{Orchestrator, Outcome};
use crate::storage::PromptStorage;

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationJob {
    Static { user_id: Uuid },
    RegenerateStatic { user_id: Uuid, prompt_type: PromptType },
    History { user_id: Uuid, prompt_type: PromptType },
    Context { user_id: Uuid, prompt_type: PromptType, draft: String },
}

impl GenerationJob {
    pub fn name(&self) -> &'static str {
        match self {
            GenerationJob::Static { .. } => "static",
            GenerationJob::RegenerateStatic { .. } => "regenerate-static",
            GenerationJob::History { .. } => "history",
            GenerationJob::Context { .. } => "context",
        }
    }

    /// Runs the job to completion. One outcome per prompt type touched.
    pub async fn run(self, orchestrator: &Orchestrator) -> Vec<(PromptType, Outcome)> {
        match self {
            GenerationJob::Static { user_id } => orchestrator.generate_static_prompts(user_id).await,
            GenerationJob::RegenerateStatic { user_id, prompt_type } => {
                vec![(prompt_type, orchestrator.regenerate_static_prompts(user_id, prompt_type).await)]
            }
            GenerationJob::History { user_id, prompt_type } => {
                vec![(prompt_type, orchestrator.generate_history_prompt(user_id, prompt_type).await)]
            }
            GenerationJob::Context {
                user_id,
                prompt_type,
                draft,
            } => vec![(prompt_type, orchestrator.generate_context_prompt(user_id, prompt_type, &draft).await)],
        }
    }
}

/// Fire-and-forget handle onto the job queue.
#[derive(Debug, Clone)]
pub struct Scheduler {
    tx: mpsc::UnboundedSender<GenerationJob>,
}

impl Scheduler {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<GenerationJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn submit(&self, job: GenerationJob) {
        debug!(job = job.name(), "Queued generation job");
        if let Err(e) = self.tx.send(job) {
            warn!(job = e.0.name(), "Job queue closed, dropping generation job");
        }
    }
}

/// Spawns `workers` tasks that run queued jobs until every [`Scheduler`]
/// handle is dropped.
pub fn spawn_workers(
    orchestrator: Arc<Orchestrator>,
    rx: mpsc::UnboundedReceiver<GenerationJob>,
    workers: usize,
) -> Vec<JoinHandle<()>> {
    let rx = Arc::new(Mutex::new(rx));
    (0..workers.max(1))
        .map(|worker| {
            let orchestrator = orchestrator.clone();
            let rx = rx.clone();
            tokio::spawn(async move {
                debug!(worker, "Generation worker started");
                loop {
                    let job = rx.lock().await.recv().await;
                    let Some(job) = job else { break };
                    let name = job.name();
                    for (prompt_type, outcome) in job.run(&orchestrator).await {
                        match outcome {
                            Outcome::Failed(reason) => {
                                warn!(worker, job = name, %prompt_type, %reason, "Generation job failed")
                            }
                            outcome => debug!(worker, job = name, %prompt_type, ?outcome, "Generation job finished"),
                        }
                    }
                }
                debug!(worker, "Generation worker stopped");
            })
        })
        .collect()
}

/// Periodically deletes inactive prompts older than `retention_days`.
pub fn spawn_cleanup(store: Arc<dyn PromptStorage>, interval: Duration, retention_days: u32) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Prompt cleanup started (interval: {:?}, retention: {} days)", interval, retention_days);
        let mut timer = time::interval(interval);
        timer.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
        loop {
            timer.tick().await;
            match store.cleanup(retention_days).await {
                Ok(0) => debug!("No inactive prompts to clean up"),
                Ok(deleted) => info!(deleted, "Deleted inactive prompts"),
                Err(e) => error!("Prompt cleanup failed: {:#}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn submit_after_receiver_dropped_does_not_panic() {
        let (scheduler, rx) = Scheduler::channel();
        drop(rx);
        scheduler.submit(GenerationJob::Static { user_id: Uuid::new_v4() });
    }

    #[tokio::test]
    async fn submitted_jobs_arrive_in_order() {
        let (scheduler, mut rx) = Scheduler::channel();
        let user_id = Uuid::new_v4();
        scheduler.submit(GenerationJob::Static { user_id });
        scheduler.submit(GenerationJob::History {
            user_id,
            prompt_type: PromptType::Reflection,
        });
        assert_eq!(rx.recv().await, Some(GenerationJob::Static { user_id }));
        assert_eq!(rx.recv().await.map(|j| j.name()), Some("history"));
    }
}
