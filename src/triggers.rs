//! When generation work gets submitted.
//!
//! History prompts fire once, when the active entry count lands on the
//! threshold. Context prompts come from a per-user session that debounces
//! draft changes and only submits while the prompt panel is open. Sessions
//! live in a [`SessionRegistry`] and evict themselves once idle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::models::PromptType;
use crate::scheduler::{GenerationJob, Scheduler};

/// True only for the save that brings the count to exactly `threshold`.
/// Later saves never refire.
pub fn crosses_history_threshold(active_entries: u64, threshold: usize) -> bool {
    u64::try_from(threshold).is_ok_and(|threshold| active_entries == threshold)
}

/// Client-side guard for context generation: long enough, and not the
/// content that was submitted last.
#[derive(Debug, Clone)]
pub struct DraftGate {
    min_length: usize,
    last_submitted: Option<String>,
}

impl DraftGate {
    pub fn new(min_length: usize) -> Self {
        Self {
            min_length,
            last_submitted: None,
        }
    }

    /// Records `draft` as submitted when it passes.
    pub fn admit(&mut self, draft: &str) -> bool {
        if draft.chars().count() < self.min_length {
            return false;
        }
        if self.last_submitted.as_deref() == Some(draft) {
            return false;
        }
        self.last_submitted = Some(draft.to_string());
        true
    }
}

#[derive(Debug)]
enum SessionEvent {
    Draft { prompt_type: PromptType, content: String },
    Panel { open: bool, prompt_type: Option<PromptType> },
}

/// Registry side of one session: the event sender plus an id that tells
/// a session apart from its replacement.
#[derive(Debug)]
struct ContextSession {
    id: u64,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

type SessionMap = Mutex<HashMap<Uuid, ContextSession>>;

fn lock(sessions: &SessionMap) -> MutexGuard<'_, HashMap<Uuid, ContextSession>> {
    sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct SessionState {
    user_id: Uuid,
    id: u64,
    gate: DraftGate,
    panel_open: bool,
    /// Last draft that survived the debounce window.
    settled: Option<(PromptType, String)>,
    scheduler: Scheduler,
    registry: Weak<SessionMap>,
}

impl SessionState {
    fn evaluate(&mut self) {
        if !self.panel_open {
            return;
        }
        let Some((prompt_type, draft)) = &self.settled else { return };
        if self.gate.admit(draft) {
            debug!(user_id = %self.user_id, %prompt_type, "Submitting context prompt generation");
            self.scheduler.submit(GenerationJob::Context {
                user_id: self.user_id,
                prompt_type: *prompt_type,
                draft: draft.clone(),
            });
        } else {
            trace!(user_id = %self.user_id, "Draft rejected by gate");
        }
    }

    fn idle_timeout(&self, config: &SessionConfig) -> Duration {
        if self.panel_open {
            config.open_idle_timeout
        } else {
            config.idle_timeout
        }
    }

    /// Removes this session from the registry unless events are still
    /// queued. Senders only reach a session under the registry lock, so
    /// nothing can arrive once the entry is gone.
    fn try_evict(&self, rx: &mpsc::UnboundedReceiver<SessionEvent>) -> bool {
        let Some(registry) = self.registry.upgrade() else { return true };
        let mut sessions = lock(&registry);
        if !rx.is_empty() {
            return false;
        }
        if sessions.get(&self.user_id).is_some_and(|s| s.id == self.id) {
            sessions.remove(&self.user_id);
        }
        true
    }
}

async fn run_session(mut state: SessionState, config: SessionConfig, mut rx: mpsc::UnboundedReceiver<SessionEvent>) {
    let mut pending: Option<(PromptType, String)> = None;
    let mut deadline: Option<Instant> = None;
    let mut idle_at = Instant::now() + state.idle_timeout(&config);

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    None => break,
                    Some(SessionEvent::Draft { prompt_type, content }) => {
                        pending = Some((prompt_type, content));
                        deadline = Some(Instant::now() + config.debounce);
                    }
                    Some(SessionEvent::Panel { open, prompt_type }) => {
                        state.panel_open = open;
                        if let (Some(new_type), Some((settled_type, _))) = (prompt_type, state.settled.as_mut()) {
                            *settled_type = new_type;
                        }
                        if let (Some(new_type), Some((pending_type, _))) = (prompt_type, pending.as_mut()) {
                            *pending_type = new_type;
                        }
                        state.evaluate();
                    }
                }
                idle_at = Instant::now() + state.idle_timeout(&config);
            }
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                state.settled = pending.take();
                state.evaluate();
                idle_at = Instant::now() + state.idle_timeout(&config);
            }
            _ = sleep_until(idle_at), if deadline.is_none() => {
                if state.try_evict(&rx) {
                    debug!(user_id = %state.user_id, panel_open = state.panel_open, "Evicting idle context session");
                    return;
                }
                idle_at = Instant::now() + state.idle_timeout(&config);
            }
        }
    }
    debug!(user_id = %state.user_id, "Context session closed");
}

/// Debounced context sessions keyed by user, created on first use.
pub struct SessionRegistry {
    config: SessionConfig,
    scheduler: Scheduler,
    sessions: Arc<SessionMap>,
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new(config: SessionConfig, scheduler: Scheduler) -> Self {
        Self {
            config,
            scheduler,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    fn spawn_session(&self, user_id: Uuid) -> ContextSession {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let state = SessionState {
            user_id,
            id,
            gate: DraftGate::new(self.config.min_length),
            panel_open: false,
            settled: None,
            scheduler: self.scheduler.clone(),
            registry: Arc::downgrade(&self.sessions),
        };
        tokio::spawn(run_session(state, self.config.clone(), rx));
        ContextSession { id, tx }
    }

    fn send(&self, user_id: Uuid, event: SessionEvent) {
        let mut sessions = lock(&self.sessions);
        let session = sessions
            .entry(user_id)
            .or_insert_with(|| self.spawn_session(user_id));
        if let Err(mpsc::error::SendError(event)) = session.tx.send(event) {
            // The task is gone without evicting itself; start over.
            let fresh = self.spawn_session(user_id);
            let _ = fresh.tx.send(event);
            sessions.insert(user_id, fresh);
        }
    }

    /// Every change restarts the debounce window.
    pub fn draft_changed(&self, user_id: Uuid, prompt_type: PromptType, content: impl Into<String>) {
        self.send(
            user_id,
            SessionEvent::Draft {
                prompt_type,
                content: content.into(),
            },
        );
    }

    /// Opening the panel re-checks the last settled draft right away.
    pub fn panel_changed(&self, user_id: Uuid, open: bool, prompt_type: Option<PromptType>) {
        self.send(user_id, SessionEvent::Panel { open, prompt_type });
    }

    /// Drops the user's session, cancelling any pending debounce.
    pub fn close(&self, user_id: &Uuid) -> bool {
        lock(&self.sessions).remove(user_id).is_some()
    }

    /// Sessions currently registered.
    pub fn len(&self) -> usize {
        lock(&self.sessions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
