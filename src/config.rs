use std::time::Duration;

/// Tuning for the generation workflows.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Prompts requested per type in a static generation.
    pub static_prompt_count: usize,
    /// Active entries needed before history-based prompts make sense.
    pub history_entry_threshold: usize,
    /// Entries fetched for history-based generation and the analysis tool.
    pub history_lookback: usize,
    /// Entries summarized in the history instruction.
    pub history_summary_count: usize,
    pub history_preview_chars: usize,
    /// Server-side floor for context-aware generation.
    pub context_min_chars: usize,
    /// Draft characters (from the end) sent with a context-aware request.
    pub context_tail_chars: usize,
    pub generation_timeout: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            static_prompt_count: 2,
            history_entry_threshold: 5,
            history_lookback: 10,
            history_summary_count: 5,
            history_preview_chars: 200,
            context_min_chars: 100,
            context_tail_chars: 500,
            generation_timeout: Duration::from_secs(30),
        }
    }
}

/// Tuning for the debounced draft trigger.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub debounce: Duration,
    /// Client-side floor; drafts shorter than this never leave the session.
    pub min_length: usize,
    /// Quiet time after which a session with the panel closed is evicted.
    pub idle_timeout: Duration,
    /// Same, for sessions whose panel was left open.
    pub open_idle_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(2000),
            min_length: 150,
            idle_timeout: Duration::from_secs(10 * 60),
            open_idle_timeout: Duration::from_secs(24 * 60 * 60),
        }
    }
}
