use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::prompt::ParseEnumError;

/// Tone the generator should use for a user's prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MentorshipStyle {
    Structured,
    Exploratory,
    #[serde(rename = "Challenge-driven")]
    ChallengeDriven,
    Reflective,
}

impl MentorshipStyle {
    pub const ALL: [MentorshipStyle; 4] = [
        MentorshipStyle::Structured,
        MentorshipStyle::Exploratory,
        MentorshipStyle::ChallengeDriven,
        MentorshipStyle::Reflective,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MentorshipStyle::Structured => "Structured",
            MentorshipStyle::Exploratory => "Exploratory",
            MentorshipStyle::ChallengeDriven => "Challenge-driven",
            MentorshipStyle::Reflective => "Reflective",
        }
    }

    /// One-line tone guide handed to the generator.
    pub fn guide(&self) -> &'static str {
        match self {
            MentorshipStyle::Structured => "Create clear, step-by-step prompts with specific objectives.",
            MentorshipStyle::Exploratory => "Create open-ended questions that encourage discovery.",
            MentorshipStyle::ChallengeDriven => "Create prompts that push boundaries and problem-solving.",
            MentorshipStyle::Reflective => "Create deep, introspective questions about experiences.",
        }
    }
}

impl Default for MentorshipStyle {
    fn default() -> Self {
        MentorshipStyle::Reflective
    }
}

/// Seniority tier, ranked from Junior to Principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ExperienceLevel {
    Junior,
    #[serde(rename = "Mid-Level")]
    MidLevel,
    Senior,
    Lead,
    Principal,
}

impl ExperienceLevel {
    pub const ALL: [ExperienceLevel; 5] = [
        ExperienceLevel::Junior,
        ExperienceLevel::MidLevel,
        ExperienceLevel::Senior,
        ExperienceLevel::Lead,
        ExperienceLevel::Principal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExperienceLevel::Junior => "Junior",
            ExperienceLevel::MidLevel => "Mid-Level",
            ExperienceLevel::Senior => "Senior",
            ExperienceLevel::Lead => "Lead",
            ExperienceLevel::Principal => "Principal",
        }
    }
}

impl FromStr for MentorshipStyle {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MentorshipStyle::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("mentorship style", s))
    }
}

impl FromStr for ExperienceLevel {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExperienceLevel::ALL
            .into_iter()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("experience level", s))
    }
}

impl fmt::Display for MentorshipStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ExperienceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Onboarding answers the generator personalizes against. Read-only here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub current_role: Option<String>,
    #[serde(default)]
    pub experience_level: Option<ExperienceLevel>,
    #[serde(default)]
    pub mentorship_style: Option<MentorshipStyle>,
    #[serde(default)]
    pub development_goals: Vec<String>,
    #[serde(default)]
    pub tech_stack: Vec<String>,
    #[serde(default)]
    pub is_onboarded: bool,
}

impl UserProfile {
    pub fn style(&self) -> MentorshipStyle {
        self.mentorship_style.unwrap_or_default()
    }
}
