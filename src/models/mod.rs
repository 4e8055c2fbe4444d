pub mod entry;
pub mod profile;
pub mod prompt;

pub use entry::{Entry, EntrySummary};
pub use profile::{ExperienceLevel, MentorshipStyle, UserProfile};
pub use prompt::{NewPrompt, ParseEnumError, Prompt, PromptCategory, PromptGrid, PromptMetadata, PromptType};
