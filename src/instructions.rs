//! Generator instructions, rendered from named tera templates.

use tera::{Context, Tera};

use crate::gateway::Message;
use crate::models::{EntrySummary, PromptType, UserProfile};

const PERSONA: &str = "\
You are an expert career coach and journaling assistant specializing in software engineering career development.

Your role is to generate thoughtful, personalized writing prompts that help users:
- Reflect on their technical growth and challenges
- Track progress toward their career goals
- Develop skills aligned with their experience level
- Maintain consistent professional development habits

Always make prompts specific and actionable, appropriate for the user's experience level, \
relevant to their tech stack and goals, engaging yet professional, and concise (1-2 sentences max).";

const STATIC_SYSTEM: &str = "\
{{ persona }}

Generate {{ prompt_type }} prompts for a {{ level }} working in {{ role }}.

Mentorship style: {{ style }}
{{ style_guide }}

Tech stack: {{ tech_stack }}
Goals: {{ goals }}

These are STATIC prompts (not personalized to recent entries).
Make them:
- Relevant to their role and experience level
- Aligned with their mentorship style
- Focused on {{ prompt_type }}
- Concise (1-2 sentences max)";

const STATIC_USER: &str = "\
Generate {{ count }} {% if fresh %}fresh {% endif %}{{ prompt_type }} prompts. Return ONLY a JSON array in this exact format:
[{\"prompt\": \"First prompt text here\"}, {\"prompt\": \"Second prompt text here\"}]

Do not include any other text, explanations, or markdown formatting.";

const HISTORY_SYSTEM: &str = "\
{{ persona }}

Analyze the user's recent journal entries and generate a personalized {{ prompt_type }} prompt that:

1. Addresses patterns or gaps in their reflection
2. Builds on themes they've been exploring
3. Encourages growth in areas they haven't covered
4. Aligns with their {{ style }} style

User context:
- Role: {{ role }}
- Level: {{ level }}
- Goals: {{ goals }}

Use the analyze_entries tool if needed to identify themes and gaps.

Return ONLY the prompt text (1-2 sentences), nothing else.";

const HISTORY_USER: &str = "\
Here are the user's recent journal entries:

{% for entry in entries %}Entry {{ loop.index }} ({{ entry.date }}): {{ entry.preview }}...{% if not loop.last %}

{% endif %}{% endfor %}

Based on these entries, generate a personalized {{ prompt_type }} prompt that addresses gaps, patterns, or opportunities for growth.";

const CONTEXT_SYSTEM: &str = "\
{{ persona }}

Generate a {{ prompt_type }} prompt based on what the user is currently writing.

The prompt should:
- Deepen their reflection on the current topic
- Match their {{ style }} mentorship style
- Be specific to their current context
- Encourage further exploration

Return ONLY the prompt text (1-2 sentences), nothing else.";

const CONTEXT_USER: &str = "\
The user is currently writing about: \"{{ draft }}\"

Generate a {{ prompt_type }} prompt that deepens their reflection on this specific topic. The prompt should:
- Be directly related to what they're writing about
- Encourage them to explore the topic further
- Match their {{ style }} mentorship style

Return ONLY the prompt text, nothing else.";

/// Last `max_chars` characters of `text`, split on a char boundary.
pub fn tail_chars(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    let start = text
        .char_indices()
        .nth(count - max_chars)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &text[start..]
}

fn head_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}

fn join_or(items: &[String], default: &str) -> String {
    if items.is_empty() {
        default.to_string()
    } else {
        items.join(", ")
    }
}

#[derive(Debug, Clone)]
pub struct InstructionBuilder {
    tera: Tera,
}

impl InstructionBuilder {
    pub fn new() -> tera::Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            ("static_system", STATIC_SYSTEM),
            ("static_user", STATIC_USER),
            ("history_system", HISTORY_SYSTEM),
            ("history_user", HISTORY_USER),
            ("context_system", CONTEXT_SYSTEM),
            ("context_user", CONTEXT_USER),
        ])?;
        Ok(Self { tera })
    }

    fn profile_context(profile: &UserProfile, prompt_type: PromptType) -> Context {
        let style = profile.style();
        let mut ctx = Context::new();
        ctx.insert("persona", PERSONA);
        ctx.insert("prompt_type", prompt_type.as_str());
        ctx.insert("style", style.as_str());
        ctx.insert("style_guide", style.guide());
        ctx.insert("role", profile.current_role.as_deref().unwrap_or("development"));
        ctx.insert(
            "level",
            profile
                .experience_level
                .map(|l| l.as_str())
                .unwrap_or("software engineer"),
        );
        ctx.insert("tech_stack", &join_or(&profile.tech_stack, "general software development"));
        ctx.insert("goals", &join_or(&profile.development_goals, "professional growth"));
        ctx
    }

    fn pair(&self, system: &str, user: &str, ctx: &Context) -> tera::Result<Vec<Message>> {
        Ok(vec![
            Message::system(self.tera.render(system, ctx)?),
            Message::user(self.tera.render(user, ctx)?),
        ])
    }

    /// Profile-only request for `count` prompts as a JSON array. `fresh`
    /// asks for new wording when replacing an existing set.
    pub fn static_prompts(
        &self,
        profile: &UserProfile,
        prompt_type: PromptType,
        count: usize,
        fresh: bool,
    ) -> tera::Result<Vec<Message>> {
        let mut ctx = Self::profile_context(profile, prompt_type);
        ctx.insert("count", &count);
        ctx.insert("fresh", &fresh);
        self.pair("static_system", "static_user", &ctx)
    }

    /// Summarizes the first `summarized` entries, `preview_chars` each.
    pub fn history_prompt(
        &self,
        profile: &UserProfile,
        prompt_type: PromptType,
        entries: &[EntrySummary],
        summarized: usize,
        preview_chars: usize,
    ) -> tera::Result<Vec<Message>> {
        let summaries: Vec<serde_json::Value> = entries
            .iter()
            .take(summarized)
            .map(|e| {
                let preview = match head_chars(&e.plain_text, preview_chars) {
                    p if p.trim().is_empty() => "No content",
                    p => p,
                };
                serde_json::json!({
                    "date": e.date.format("%Y-%m-%d").to_string(),
                    "preview": preview,
                })
            })
            .collect();

        let mut ctx = Self::profile_context(profile, prompt_type);
        ctx.insert("entries", &summaries);
        self.pair("history_system", "history_user", &ctx)
    }

    pub fn context_prompt(
        &self,
        profile: &UserProfile,
        prompt_type: PromptType,
        draft_tail: &str,
    ) -> tera::Result<Vec<Message>> {
        let mut ctx = Self::profile_context(profile, prompt_type);
        ctx.insert("draft", draft_tail);
        self.pair("context_system", "context_user", &ctx)
    }
}
