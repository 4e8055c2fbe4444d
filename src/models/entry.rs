use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A journal entry as the prompt core sees it: the plain-text projection
/// only, never the rich editor content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub user_id: Uuid,
    pub entry_date: NaiveDate,
    #[serde(default)]
    pub plain_text: String,
    pub is_active: bool,
}

impl Entry {
    pub fn new(user_id: Uuid, entry_date: NaiveDate, plain_text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            entry_date,
            plain_text: plain_text.into(),
            is_active: true,
        }
    }

    pub fn summary(&self) -> EntrySummary {
        EntrySummary {
            date: self.entry_date,
            plain_text: self.plain_text.clone(),
        }
    }
}

/// What `EntrySource::recent_entries` yields, newest first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntrySummary {
    pub date: NaiveDate,
    pub plain_text: String,
}

/// Active entries for one user, newest entry date first, capped at `limit`.
pub(crate) fn recent_summaries<'a>(
    entries: impl IntoIterator<Item = &'a Entry>,
    user_id: &Uuid,
    limit: usize,
) -> Vec<EntrySummary> {
    let mut active: Vec<&Entry> = entries
        .into_iter()
        .filter(|e| e.user_id == *user_id && e.is_active)
        .collect();
    active.sort_by(|a, b| b.entry_date.cmp(&a.entry_date));
    active.into_iter().take(limit).map(Entry::summary).collect()
}
