use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Thematic axis of a writing prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromptType {
    Reflection,
    SkillDevelopment,
    CareerGrowth,
    DailyCheckin,
}

impl PromptType {
    pub const ALL: [PromptType; 4] = [
        PromptType::Reflection,
        PromptType::SkillDevelopment,
        PromptType::CareerGrowth,
        PromptType::DailyCheckin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PromptType::Reflection => "reflection",
            PromptType::SkillDevelopment => "skill-development",
            PromptType::CareerGrowth => "career-growth",
            PromptType::DailyCheckin => "daily-checkin",
        }
    }
}

/// Provenance axis: how (and how often) a prompt gets generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromptCategory {
    Static,
    HistoryBased,
    ContextAware,
}

impl PromptCategory {
    pub const ALL: [PromptCategory; 3] = [
        PromptCategory::Static,
        PromptCategory::HistoryBased,
        PromptCategory::ContextAware,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PromptCategory::Static => "static",
            PromptCategory::HistoryBased => "history-based",
            PromptCategory::ContextAware => "context-aware",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

impl FromStr for PromptType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PromptType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("prompt type", s))
    }
}

impl FromStr for PromptCategory {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PromptCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("prompt category", s))
    }
}

impl fmt::Display for PromptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for PromptCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generation bookkeeping carried by every stored prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PromptMetadata {
    /// Generating model, or `"template"` for fallback content.
    pub model: String,
    pub tokens_used: u32,
    pub generated_at: DateTime<Utc>,
    pub version: u32,
}

impl PromptMetadata {
    pub const TEMPLATE_MODEL: &'static str = "template";

    pub fn template(version: u32) -> Self {
        Self {
            model: Self::TEMPLATE_MODEL.to_string(),
            tokens_used: 0,
            generated_at: Utc::now(),
            version,
        }
    }
}

/// A writing prompt shown to a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    #[serde(default = "Uuid::new_v4")] // Default to a new UUID if missing during deserialization
    pub id: Uuid,
    pub user_id: Uuid,
    pub prompt_type: PromptType,
    pub prompt_category: PromptCategory,
    pub prompt_text: String,
    pub metadata: PromptMetadata,
    pub times_shown: u32,
    pub times_used: u32,
    pub last_shown_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for `PromptStorage::create_prompt`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPrompt {
    pub user_id: Uuid,
    pub prompt_type: PromptType,
    pub prompt_category: PromptCategory,
    pub prompt_text: String,
    pub metadata: PromptMetadata,
}

impl Prompt {
    /// Builds a fresh, active record with zeroed usage counters.
    pub fn new(new: NewPrompt) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            prompt_type: new.prompt_type,
            prompt_category: new.prompt_category,
            prompt_text: new.prompt_text,
            metadata: new.metadata,
            times_shown: 0,
            times_used: 0,
            last_shown_at: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn matches(&self, user_id: &Uuid, prompt_type: PromptType, category: PromptCategory) -> bool {
        self.user_id == *user_id && self.prompt_type == prompt_type && self.prompt_category == category
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.updated_at = Utc::now();
    }

    pub fn record_shown(&mut self) {
        let now = Utc::now();
        self.times_shown += 1;
        self.last_shown_at = Some(now);
        self.updated_at = now;
    }

    pub fn record_used(&mut self) {
        let now = Utc::now();
        self.times_used += 1;
        self.last_shown_at = Some(now);
        self.updated_at = now;
    }
}

/// Active prompts grouped by type, then category. All twelve cells are
/// always present so readers never have to guard against missing keys.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(transparent)]
pub struct PromptGrid(BTreeMap<PromptType, BTreeMap<PromptCategory, Vec<Prompt>>>);

impl PromptGrid {
    pub fn empty() -> Self {
        let grid = PromptType::ALL
            .into_iter()
            .map(|t| {
                let cells = PromptCategory::ALL.into_iter().map(|c| (c, Vec::new())).collect();
                (t, cells)
            })
            .collect();
        Self(grid)
    }

    pub fn from_prompts(prompts: impl IntoIterator<Item = Prompt>) -> Self {
        let mut grid = Self::empty();
        for prompt in prompts {
            grid.push(prompt);
        }
        grid
    }

    fn push(&mut self, prompt: Prompt) {
        if let Some(cell) = self
            .0
            .get_mut(&prompt.prompt_type)
            .and_then(|cells| cells.get_mut(&prompt.prompt_category))
        {
            cell.push(prompt);
        }
    }

    pub fn get(&self, prompt_type: PromptType, category: PromptCategory) -> &[Prompt] {
        self.0
            .get(&prompt_type)
            .and_then(|cells| cells.get(&category))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.0.values().flat_map(|cells| cells.values()).map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(prompt_type: PromptType, category: PromptCategory) -> Prompt {
        Prompt::new(NewPrompt {
            user_id: Uuid::new_v4(),
            prompt_type,
            prompt_category: category,
            prompt_text: "What did you learn?".to_string(),
            metadata: PromptMetadata::template(1),
        })
    }

    #[test]
    fn enum_strings_round_trip_through_from_str() {
        for t in PromptType::ALL {
            assert_eq!(t.as_str().parse::<PromptType>().unwrap(), t);
        }
        assert_eq!("history-based".parse::<PromptCategory>().unwrap(), PromptCategory::HistoryBased);
        assert!("weekly".parse::<PromptType>().is_err());
    }

    #[test]
    fn serde_uses_kebab_case_names() {
        let json = serde_json::to_string(&PromptType::SkillDevelopment).unwrap();
        assert_eq!(json, "\"skill-development\"");
        let category: PromptCategory = serde_json::from_str("\"context-aware\"").unwrap();
        assert_eq!(category, PromptCategory::ContextAware);
    }

    #[test]
    fn empty_grid_has_every_cell() {
        let grid = PromptGrid::empty();
        let value = serde_json::to_value(&grid).unwrap();
        let types = value.as_object().unwrap();
        assert_eq!(types.len(), 4);
        for cells in types.values() {
            let cells = cells.as_object().unwrap();
            assert_eq!(cells.len(), 3);
            assert!(cells.values().all(|v| v.as_array().unwrap().is_empty()));
        }
        assert!(grid.is_empty());
    }

    #[test]
    fn grid_places_prompts_by_type_and_category() {
        let grid = PromptGrid::from_prompts(vec![
            sample(PromptType::CareerGrowth, PromptCategory::Static),
            sample(PromptType::CareerGrowth, PromptCategory::Static),
            sample(PromptType::DailyCheckin, PromptCategory::ContextAware),
        ]);
        assert_eq!(grid.get(PromptType::CareerGrowth, PromptCategory::Static).len(), 2);
        assert_eq!(grid.get(PromptType::DailyCheckin, PromptCategory::ContextAware).len(), 1);
        assert!(grid.get(PromptType::Reflection, PromptCategory::HistoryBased).is_empty());
        assert_eq!(grid.len(), 3);
    }

    #[test]
    fn usage_counters_touch_last_shown() {
        let mut prompt = sample(PromptType::Reflection, PromptCategory::Static);
        prompt.record_shown();
        prompt.record_used();
        assert_eq!(prompt.times_shown, 1);
        assert_eq!(prompt.times_used, 1);
        assert!(prompt.last_shown_at.is_some());
        prompt.deactivate();
        assert!(!prompt.is_active);
    }
}
