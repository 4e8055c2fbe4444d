use super::{cutoff, EntrySource, ProfileSource, PromptStorage};
use crate::models::{EntrySummary, NewPrompt, Prompt, PromptCategory, PromptMetadata, PromptType, UserProfile};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::sync::Arc;
use uuid::Uuid;

// Define a struct that maps to the database table row
#[derive(FromRow, Debug, Clone)]
struct PromptRow {
    id: Uuid,
    user_id: Uuid,
    prompt_type: String,
    prompt_category: String,
    prompt_text: String,
    model: String,
    tokens_used: i32,
    generated_at: DateTime<Utc>,
    version: i32,
    times_shown: i32,
    times_used: i32,
    last_shown_at: Option<DateTime<Utc>>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn unsigned(value: i32, column: &str) -> Result<u32> {
    u32::try_from(value).with_context(|| format!("Negative {column} in prompts row: {value}"))
}

// Helper to convert from DB row struct to our application Prompt struct
impl TryFrom<PromptRow> for Prompt {
    type Error = anyhow::Error;

    fn try_from(row: PromptRow) -> Result<Self> {
        Ok(Prompt {
            id: row.id,
            user_id: row.user_id,
            prompt_type: row.prompt_type.parse()?,
            prompt_category: row.prompt_category.parse()?,
            prompt_text: row.prompt_text,
            metadata: PromptMetadata {
                model: row.model,
                tokens_used: unsigned(row.tokens_used, "tokens_used")?,
                generated_at: row.generated_at,
                version: unsigned(row.version, "version")?,
            },
            times_shown: unsigned(row.times_shown, "times_shown")?,
            times_used: unsigned(row.times_used, "times_used")?,
            last_shown_at: row.last_shown_at,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow, Debug)]
struct ProfileRow {
    current_role: Option<String>,
    experience_level: Option<String>,
    mentorship_style: Option<String>,
    development_goals: Option<serde_json::Value>,
    tech_stack: Option<serde_json::Value>,
    is_onboarded: Option<bool>,
}

impl From<ProfileRow> for UserProfile {
    fn from(row: ProfileRow) -> Self {
        let strings = |v: Option<serde_json::Value>| {
            v.and_then(|v| serde_json::from_value::<Vec<String>>(v).ok())
                .unwrap_or_default()
        };
        UserProfile {
            current_role: row.current_role,
            // Unknown enum strings are treated as unset.
            experience_level: row.experience_level.and_then(|s| s.parse().ok()),
            mentorship_style: row.mentorship_style.and_then(|s| s.parse().ok()),
            development_goals: strings(row.development_goals),
            tech_stack: strings(row.tech_stack),
            is_onboarded: row.is_onboarded.unwrap_or(false),
        }
    }
}

#[derive(FromRow, Debug)]
struct EntryRow {
    entry_date: NaiveDate,
    plain_text: Option<String>,
}

/// PostgreSQL storage implementation. Reads `users` and `entries`, owns `prompts`.
#[derive(Clone)]
pub struct PostgresStorage {
    pool: Arc<PgPool>,
}

impl PostgresStorage {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5) // Configure pool size
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;
        Ok(PostgresStorage {
            pool: Arc::new(pool),
        })
    }

    /// Initializes the database schema if it doesn't exist.
    pub async fn init_schema(&self) -> Result<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY,
                "current_role" TEXT,
                experience_level TEXT,
                mentorship_style TEXT,
                development_goals JSONB,
                tech_stack JSONB,
                is_onboarded BOOLEAN NOT NULL DEFAULT FALSE
            );
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS entries (
                id UUID PRIMARY KEY,
                user_id UUID NOT NULL REFERENCES users(id),
                entry_date DATE NOT NULL,
                plain_text TEXT,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            "#,
            "CREATE INDEX IF NOT EXISTS entries_user_active_date ON entries (user_id, is_active, entry_date DESC);",
            r#"
            CREATE TABLE IF NOT EXISTS prompts (
                id UUID PRIMARY KEY,
                user_id UUID NOT NULL,
                prompt_type TEXT NOT NULL,
                prompt_category TEXT NOT NULL,
                prompt_text TEXT NOT NULL,
                model TEXT NOT NULL,
                tokens_used INTEGER NOT NULL DEFAULT 0,
                generated_at TIMESTAMPTZ NOT NULL,
                version INTEGER NOT NULL,
                times_shown INTEGER NOT NULL DEFAULT 0,
                times_used INTEGER NOT NULL DEFAULT 0,
                last_shown_at TIMESTAMPTZ,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            "#,
            "CREATE INDEX IF NOT EXISTS prompts_user_type_active ON prompts (user_id, prompt_type, is_active);",
            "CREATE INDEX IF NOT EXISTS prompts_user_category ON prompts (user_id, prompt_category);",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .context("Failed to initialize database schema")?;
        }
        Ok(())
    }

    async fn bump_counter(&self, id: &Uuid, column: &str) -> Result<bool> {
        // `column` is one of two internal literals, never user input.
        let sql = format!(
            "UPDATE prompts SET {column} = {column} + 1, last_shown_at = NOW(), updated_at = NOW() WHERE id = $1"
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&*self.pool)
            .await
            .with_context(|| format!("Failed to update {} for prompt '{}'", column, id))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl PromptStorage for PostgresStorage {
    async fn create_prompt(&self, prompt: NewPrompt) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO prompts (id, user_id, prompt_type, prompt_category, prompt_text, model, tokens_used, generated_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9);
            "#,
        )
        .bind(id)
        .bind(prompt.user_id)
        .bind(prompt.prompt_type.as_str())
        .bind(prompt.prompt_category.as_str())
        .bind(&prompt.prompt_text)
        .bind(&prompt.metadata.model)
        .bind(i32::try_from(prompt.metadata.tokens_used).unwrap_or(i32::MAX))
        .bind(prompt.metadata.generated_at)
        .bind(i32::try_from(prompt.metadata.version).unwrap_or(i32::MAX))
        .execute(&*self.pool)
        .await
        .with_context(|| format!("Failed to insert prompt for user '{}'", prompt.user_id))?;
        Ok(id)
    }

    async fn deactivate_prompts(&self, user_id: &Uuid, prompt_type: PromptType, category: PromptCategory) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE prompts SET is_active = FALSE, updated_at = NOW()
            WHERE user_id = $1 AND prompt_type = $2 AND prompt_category = $3 AND is_active
            "#,
        )
        .bind(user_id)
        .bind(prompt_type.as_str())
        .bind(category.as_str())
        .execute(&*self.pool)
        .await
        .with_context(|| format!("Failed to deactivate {}/{} prompts for user '{}'", prompt_type, category, user_id))?;
        Ok(result.rows_affected())
    }

    async fn active_prompts(&self, user_id: &Uuid) -> Result<Vec<Prompt>> {
        let rows: Vec<PromptRow> =
            sqlx::query_as("SELECT * FROM prompts WHERE user_id = $1 AND is_active ORDER BY created_at")
                .bind(user_id)
                .fetch_all(&*self.pool)
                .await
                .with_context(|| format!("Failed to fetch active prompts for user '{}'", user_id))?;
        rows.into_iter().map(Prompt::try_from).collect()
    }

    async fn get_prompt(&self, id: &Uuid) -> Result<Option<Prompt>> {
        let row: Option<PromptRow> = sqlx::query_as("SELECT * FROM prompts WHERE id = $1")
            .bind(id)
            .fetch_optional(&*self.pool)
            .await
            .with_context(|| format!("Failed to fetch prompt with id '{}' from database", id))?;
        row.map(Prompt::try_from).transpose()
    }

    async fn latest_version(&self, user_id: &Uuid, prompt_type: PromptType, category: PromptCategory) -> Result<Option<u32>> {
        let version: Option<i32> = sqlx::query_scalar(
            "SELECT MAX(version) FROM prompts WHERE user_id = $1 AND prompt_type = $2 AND prompt_category = $3",
        )
        .bind(user_id)
        .bind(prompt_type.as_str())
        .bind(category.as_str())
        .fetch_one(&*self.pool)
        .await
        .context("Failed to read latest prompt version")?;
        Ok(version.and_then(|v| u32::try_from(v).ok()))
    }

    async fn mark_shown(&self, id: &Uuid) -> Result<bool> {
        self.bump_counter(id, "times_shown").await
    }

    async fn mark_used(&self, id: &Uuid) -> Result<bool> {
        self.bump_counter(id, "times_used").await
    }

    async fn cleanup(&self, older_than_days: u32) -> Result<u64> {
        let result = sqlx::query("DELETE FROM prompts WHERE NOT is_active AND updated_at < $1")
            .bind(cutoff(older_than_days))
            .execute(&*self.pool)
            .await
            .context("Failed to delete old inactive prompts")?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ProfileSource for PostgresStorage {
    async fn get_profile(&self, user_id: &Uuid) -> Result<Option<UserProfile>> {
        let row: Option<ProfileRow> = sqlx::query_as(
            r#"
            SELECT "current_role", experience_level, mentorship_style, development_goals, tech_stack, is_onboarded
            FROM users WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&*self.pool)
        .await
        .with_context(|| format!("Failed to fetch profile for user '{}'", user_id))?;
        Ok(row.map(UserProfile::from))
    }
}

#[async_trait]
impl EntrySource for PostgresStorage {
    async fn recent_entries(&self, user_id: &Uuid, limit: usize) -> Result<Vec<EntrySummary>> {
        let rows: Vec<EntryRow> = sqlx::query_as(
            "SELECT entry_date, plain_text FROM entries WHERE user_id = $1 AND is_active ORDER BY entry_date DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&*self.pool)
        .await
        .with_context(|| format!("Failed to fetch recent entries for user '{}'", user_id))?;
        Ok(rows
            .into_iter()
            .map(|row| EntrySummary {
                date: row.entry_date,
                plain_text: row.plain_text.unwrap_or_default(),
            })
            .collect())
    }

    async fn count_active_entries(&self, user_id: &Uuid) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries WHERE user_id = $1 AND is_active")
            .bind(user_id)
            .fetch_one(&*self.pool)
            .await
            .with_context(|| format!("Failed to count entries for user '{}'", user_id))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}
