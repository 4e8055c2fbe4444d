//! Keyword-based analysis of recent entries, offered to the generator as
//! the `analyze_entries` tool during history-based generation.

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::models::EntrySummary;

pub const DEFAULT_LOOKBACK: usize = 5;

const BUILTIN_TAXONOMY: &str = include_str!("../data/taxonomy.json");

#[derive(Debug, Deserialize)]
struct TaxonomyFile {
    theme_min_mentions: usize,
    max_themes: usize,
    max_gaps: usize,
    themes: Vec<ThemeKeyword>,
    reflection_areas: Vec<ReflectionArea>,
    problem_words: Vec<String>,
    solution_words: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ThemeKeyword {
    keyword: String,
    theme: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReflectionArea {
    pub area: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone)]
struct ThemeRule {
    theme: String,
    pattern: Regex,
}

/// Keyword tables driving the analysis, compiled once at startup.
#[derive(Debug, Clone)]
pub struct Taxonomy {
    theme_min_mentions: usize,
    max_themes: usize,
    max_gaps: usize,
    themes: Vec<ThemeRule>,
    reflection_areas: Vec<ReflectionArea>,
    problem_pattern: Regex,
    solution_pattern: Regex,
}

fn word_prefix_pattern(words: &[String]) -> Result<Regex> {
    let alternatives: Vec<String> = words.iter().map(|w| regex::escape(w)).collect();
    Regex::new(&format!(r"(?i)\b(?:{})\w*\b", alternatives.join("|")))
        .with_context(|| format!("Failed to compile keyword pattern for {:?}", words))
}

impl Taxonomy {
    pub fn from_json(json: &str) -> Result<Self> {
        let file: TaxonomyFile = serde_json::from_str(json).context("Failed to parse keyword taxonomy")?;
        let themes = file
            .themes
            .into_iter()
            .map(|t| {
                Ok(ThemeRule {
                    pattern: word_prefix_pattern(std::slice::from_ref(&t.keyword))?,
                    theme: t.theme,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            theme_min_mentions: file.theme_min_mentions,
            max_themes: file.max_themes,
            max_gaps: file.max_gaps,
            themes,
            reflection_areas: file.reflection_areas,
            problem_pattern: word_prefix_pattern(&file.problem_words)?,
            solution_pattern: word_prefix_pattern(&file.solution_words)?,
        })
    }

    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_TAXONOMY)
    }

    /// Loads an override file when given, the embedded table otherwise.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let json = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read taxonomy file: {}", path.display()))?;
                Self::from_json(&json)
            }
            None => Self::builtin(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntryAnalysis {
    pub themes: Vec<String>,
    pub gaps: Vec<String>,
    pub patterns: Vec<String>,
    pub recent_topics: Vec<String>,
}

fn joined_lowercase(entries: &[EntrySummary]) -> String {
    entries
        .iter()
        .map(|e| e.plain_text.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Analyzes the first `lookback` entries (newest first).
pub fn analyze_entries(taxonomy: &Taxonomy, entries: &[EntrySummary], lookback: usize) -> EntryAnalysis {
    let recent = &entries[..lookback.min(entries.len())];
    let text = joined_lowercase(recent);

    EntryAnalysis {
        themes: extract_themes(taxonomy, &text),
        gaps: identify_gaps(taxonomy, &text),
        patterns: find_patterns(taxonomy, recent, &text),
        recent_topics: extract_recent_topics(&recent[..recent.len().min(3)]),
    }
}

fn extract_themes(taxonomy: &Taxonomy, text: &str) -> Vec<String> {
    taxonomy
        .themes
        .iter()
        .filter(|rule| rule.pattern.find_iter(text).count() >= taxonomy.theme_min_mentions)
        .map(|rule| rule.theme.clone())
        .take(taxonomy.max_themes)
        .collect()
}

fn identify_gaps(taxonomy: &Taxonomy, text: &str) -> Vec<String> {
    taxonomy
        .reflection_areas
        .iter()
        .filter(|area| !area.keywords.iter().any(|kw| text.contains(kw.as_str())))
        .map(|area| area.area.clone())
        .take(taxonomy.max_gaps)
        .collect()
}

fn find_patterns(taxonomy: &Taxonomy, entries: &[EntrySummary], text: &str) -> Vec<String> {
    if entries.is_empty() {
        return Vec::new();
    }
    let mut patterns = Vec::new();

    let total: usize = entries.iter().map(|e| e.plain_text.chars().count()).sum();
    let average = total as f64 / entries.len() as f64;
    if average < 200.0 {
        patterns.push("Entries tend to be brief - could benefit from deeper reflection".to_string());
    } else if average > 800.0 {
        patterns.push("Detailed, thorough entries - shows strong reflection habit".to_string());
    }

    if entries.len() >= 5 {
        patterns.push("Consistent journaling habit - maintaining regular entries".to_string());
    } else if entries.len() < 3 {
        patterns.push("Building journaling habit - still getting started".to_string());
    }

    let problems = taxonomy.problem_pattern.find_iter(text).count();
    let solutions = taxonomy.solution_pattern.find_iter(text).count();
    if problems > 0 && solutions > 0 {
        if problems > solutions * 2 {
            patterns.push(
                "Focus tends toward identifying problems - could explore more solution-oriented thinking".to_string(),
            );
        } else if solutions > problems {
            patterns.push("Solution-focused mindset - actively working through challenges".to_string());
        }
    }

    patterns
}

fn extract_recent_topics(entries: &[EntrySummary]) -> Vec<String> {
    let mut topics = Vec::new();
    for entry in entries {
        let lowered = entry.plain_text.to_lowercase();
        let mut seen = HashSet::new();
        let words = lowered
            .split_whitespace()
            .filter(|w| w.chars().count() > 4)
            .filter(|w| seen.insert(*w))
            .take(3);
        topics.extend(words.map(str::to_string));
    }

    let mut seen = HashSet::new();
    topics.retain(|t| seen.insert(t.clone()));
    topics.truncate(5);
    topics
}
