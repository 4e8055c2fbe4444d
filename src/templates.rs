//! Pre-written prompts used when static generation fails.

use rand::seq::IndexedRandom;

use crate::models::{MentorshipStyle, PromptType};

type StyleTable = &'static [(MentorshipStyle, &'static [&'static str])];
type TemplateTable = &'static [(PromptType, StyleTable)];

const GENERIC: &[&str] = &["What did you learn today?", "What challenged you today?"];

const TEMPLATES: TemplateTable = &[
    (
        PromptType::Reflection,
        &[
            (
                MentorshipStyle::Structured,
                &[
                    "What specific challenge did you face today, and what steps did you take to address it?",
                    "List three things you learned this week and how you plan to apply them.",
                ],
            ),
            (
                MentorshipStyle::Exploratory,
                &[
                    "What surprised you most about your work this week?",
                    "If you could change one thing about how you approached a recent project, what would it be and why?",
                ],
            ),
            (
                MentorshipStyle::ChallengeDriven,
                &[
                    "What's the hardest technical problem you're currently working on? How are you pushing yourself to solve it?",
                    "What assumption did you challenge in your work recently? What did you discover?",
                ],
            ),
            (
                MentorshipStyle::Reflective,
                &[
                    "How did today's work align with your long-term career goals?",
                    "What emotions did you experience during your most challenging moment this week? What did they reveal?",
                ],
            ),
        ],
    ),
    (
        PromptType::SkillDevelopment,
        &[
            (
                MentorshipStyle::Structured,
                &[
                    "Choose one technical skill from your stack. What concrete steps will you take this week to improve it?",
                    "Review a piece of code you wrote recently. What patterns or practices could you improve?",
                ],
            ),
            (
                MentorshipStyle::Exploratory,
                &[
                    "What technology or concept have you been curious about? What's one thing you could explore today?",
                    "How has your understanding of a particular technology evolved over the past month?",
                ],
            ),
            (
                MentorshipStyle::ChallengeDriven,
                &[
                    "What skill are you deliberately practicing outside your comfort zone? What's difficult about it?",
                    "Set a technical challenge for yourself this week. What will success look like?",
                ],
            ),
            (
                MentorshipStyle::Reflective,
                &[
                    "What technical skill comes naturally to you? How can you leverage it to learn something new?",
                    "Think about a recent bug or error. What deeper lesson about programming did it teach you?",
                ],
            ),
        ],
    ),
    (
        PromptType::CareerGrowth,
        &[
            (
                MentorshipStyle::Structured,
                &[
                    "Review one of your development goals. What progress have you made? What are your next steps?",
                    "What specific action will you take this week to move closer to your career aspirations?",
                ],
            ),
            (
                MentorshipStyle::Exploratory,
                &[
                    "Where do you see yourself in your career a year from now? What possibilities excite you?",
                    "What new opportunity or direction have you noticed recently? How might you explore it?",
                ],
            ),
            (
                MentorshipStyle::ChallengeDriven,
                &[
                    "What career risk are you considering? What would make it worth taking?",
                    "What's one limiting belief about your career that you could challenge?",
                ],
            ),
            (
                MentorshipStyle::Reflective,
                &[
                    "What professional accomplishment are you most proud of? What does it reveal about your strengths?",
                    "How has your definition of career success evolved? What matters most to you now?",
                ],
            ),
        ],
    ),
    (
        PromptType::DailyCheckin,
        &[
            (
                MentorshipStyle::Structured,
                &[
                    "What did you accomplish today? What tasks are you planning for tomorrow?",
                    "Rate your day from 1-10 and explain why. What would make tomorrow better?",
                ],
            ),
            (
                MentorshipStyle::Exploratory,
                &[
                    "What was the most interesting thing that happened in your work today?",
                    "If today was a chapter in a book about your career, what would it be titled?",
                ],
            ),
            (
                MentorshipStyle::ChallengeDriven,
                &[
                    "What did you do today that pushed you outside your comfort zone?",
                    "What problem did you tackle today? What would you do differently if you faced it again?",
                ],
            ),
            (
                MentorshipStyle::Reflective,
                &[
                    "How did you show up for yourself and others today?",
                    "What moment from today will you carry forward? Why does it matter?",
                ],
            ),
        ],
    ),
];

fn lookup(table: TemplateTable, prompt_type: PromptType, style: MentorshipStyle) -> Option<&'static [&'static str]> {
    table
        .iter()
        .find(|(t, _)| *t == prompt_type)
        .and_then(|(_, styles)| styles.iter().find(|(s, _)| *s == style))
        .map(|(_, templates)| *templates)
        .filter(|templates| !templates.is_empty())
}

fn templates_in(table: TemplateTable, prompt_type: PromptType, style: MentorshipStyle) -> &'static [&'static str] {
    lookup(table, prompt_type, style)
        .or_else(|| lookup(table, prompt_type, MentorshipStyle::Reflective))
        .unwrap_or(GENERIC)
}

/// Fallback prompts for a (type, style) pair. Never empty.
pub fn get_templates(prompt_type: PromptType, style: MentorshipStyle) -> &'static [&'static str] {
    templates_in(TEMPLATES, prompt_type, style)
}

pub fn get_random_template(prompt_type: PromptType, style: MentorshipStyle) -> &'static str {
    let templates = get_templates(prompt_type, style);
    templates.choose(&mut rand::rng()).copied().unwrap_or(GENERIC[0])
}
