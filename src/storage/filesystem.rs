use crate::models::entry::recent_summaries;
use crate::models::{Entry, EntrySummary, NewPrompt, Prompt, PromptCategory, PromptType, UserProfile};
use crate::storage::{cutoff, EntrySource, ProfileSource, PromptStorage};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{error, instrument, warn};
use uuid::Uuid;

/// JSON-file storage rooted at one directory:
/// `prompts/<id>.json`, `profiles/<user>.json`, `entries/<user>.json`.
#[derive(Debug)]
pub struct FileSystemStorage {
    root: PathBuf,
    // Serializes read-modify-write cycles on prompt files.
    write_lock: Mutex<()>,
}

impl FileSystemStorage {
    /// Creates a new FileSystemStorage instance.
    /// Ensures the prompt directory exists.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref().to_path_buf();
        // Ensure directory exists (synchronous for simplicity in constructor)
        if let Err(e) = std::fs::create_dir_all(root.join("prompts")) {
            // Log error but proceed; async methods will handle failures
            error!(path = %root.display(), error = %e, "Failed to create prompt directory during initialization");
        }
        Self {
            root,
            write_lock: Mutex::new(()),
        }
    }

    fn prompt_dir(&self) -> PathBuf {
        self.root.join("prompts")
    }

    fn prompt_path(&self, id: &Uuid) -> PathBuf {
        self.prompt_dir().join(format!("{}.json", id))
    }

    fn profile_path(&self, user_id: &Uuid) -> PathBuf {
        self.root.join("profiles").join(format!("{}.json", user_id))
    }

    fn entries_path(&self, user_id: &Uuid) -> PathBuf {
        self.root.join("entries").join(format!("{}.json", user_id))
    }

    async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
        match fs::File::open(path).await {
            Ok(mut file) => {
                let mut contents = String::new();
                if let Err(e) = file.read_to_string(&mut contents).await {
                    return Err(e).with_context(|| format!("Failed to read file: {}", path.display()));
                }
                serde_json::from_str(&contents)
                    .map(Some)
                    .with_context(|| format!("Failed to deserialize file: {}", path.display()))
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to open file: {}", path.display())),
        }
    }

    async fn write_prompt(&self, prompt: &Prompt) -> Result<()> {
        let path = self.prompt_path(&prompt.id);
        let contents = serde_json::to_string_pretty(prompt)
            .with_context(|| format!("Failed to serialize prompt ID {}", prompt.id))?;

        let dir = self.prompt_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to create prompt directory '{}'", dir.display()))?;
        }

        let mut file = fs::File::create(&path)
            .await
            .with_context(|| format!("Failed to create/open prompt file for writing: {}", path.display()))?;

        file.write_all(contents.as_bytes())
            .await
            .with_context(|| format!("Failed to write to prompt file: {}", path.display()))
    }

    async fn read_all_prompts(&self) -> Result<Vec<Prompt>> {
        let dir = self.prompt_dir();
        let mut prompts = Vec::new();
        let mut read_dir = match fs::read_dir(&dir).await {
            Ok(read_dir) => read_dir,
            Err(ref e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(prompts),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read prompt directory '{}'", dir.display()))
            }
        };

        while let Some(entry) = read_dir.next_entry().await? {
            let path = entry.path();
            if path.is_file() && path.extension().map_or(false, |ext| ext == "json") {
                match Self::read_json::<Prompt>(&path).await {
                    Ok(Some(prompt)) => prompts.push(prompt),
                    Ok(None) => warn!(path = %path.display(), "Prompt file vanished during scan"),
                    Err(e) => warn!(path = %path.display(), error = %e, "Error reading prompt file during scan"),
                }
            }
        }
        prompts.sort_by_key(|p| p.created_at);
        Ok(prompts)
    }

    async fn modify<F>(&self, id: &Uuid, apply: F) -> Result<bool>
    where
        F: FnOnce(&mut Prompt) + Send,
    {
        let _guard = self.write_lock.lock().await;
        let Some(mut prompt) = Self::read_json::<Prompt>(&self.prompt_path(id)).await? else {
            return Ok(false);
        };
        apply(&mut prompt);
        self.write_prompt(&prompt).await?;
        Ok(true)
    }

    /// Writes a profile file, replacing any previous one.
    pub async fn save_profile(&self, user_id: &Uuid, profile: &UserProfile) -> Result<()> {
        let path = self.profile_path(user_id);
        Self::write_file(&path, &serde_json::to_vec_pretty(profile)?).await
    }

    /// Replaces the entry list of a user.
    pub async fn save_entries(&self, user_id: &Uuid, entries: &[Entry]) -> Result<()> {
        let path = self.entries_path(user_id);
        Self::write_file(&path, &serde_json::to_vec_pretty(entries)?).await
    }

    async fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory '{}'", parent.display()))?;
        }
        fs::write(path, contents)
            .await
            .with_context(|| format!("Failed to write file: {}", path.display()))
    }

    async fn user_entries(&self, user_id: &Uuid) -> Result<Vec<Entry>> {
        Ok(Self::read_json::<Vec<Entry>>(&self.entries_path(user_id))
            .await?
            .unwrap_or_default())
    }
}

#[async_trait]
impl PromptStorage for FileSystemStorage {
    #[instrument(skip(self, prompt), fields(user_id = %prompt.user_id, prompt_type = %prompt.prompt_type))]
    async fn create_prompt(&self, prompt: NewPrompt) -> Result<Uuid> {
        let prompt = Prompt::new(prompt);
        self.write_prompt(&prompt).await?;
        Ok(prompt.id)
    }

    async fn deactivate_prompts(&self, user_id: &Uuid, prompt_type: PromptType, category: PromptCategory) -> Result<u64> {
        let _guard = self.write_lock.lock().await;
        let mut changed = 0;
        for mut prompt in self.read_all_prompts().await? {
            if prompt.is_active && prompt.matches(user_id, prompt_type, category) {
                prompt.deactivate();
                self.write_prompt(&prompt).await?;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn active_prompts(&self, user_id: &Uuid) -> Result<Vec<Prompt>> {
        Ok(self
            .read_all_prompts()
            .await?
            .into_iter()
            .filter(|p| p.user_id == *user_id && p.is_active)
            .collect())
    }

    async fn get_prompt(&self, id: &Uuid) -> Result<Option<Prompt>> {
        Self::read_json(&self.prompt_path(id)).await
    }

    async fn latest_version(&self, user_id: &Uuid, prompt_type: PromptType, category: PromptCategory) -> Result<Option<u32>> {
        Ok(self
            .read_all_prompts()
            .await?
            .iter()
            .filter(|p| p.matches(user_id, prompt_type, category))
            .map(|p| p.metadata.version)
            .max())
    }

    async fn mark_shown(&self, id: &Uuid) -> Result<bool> {
        self.modify(id, Prompt::record_shown).await
    }

    async fn mark_used(&self, id: &Uuid) -> Result<bool> {
        self.modify(id, Prompt::record_used).await
    }

    async fn cleanup(&self, older_than_days: u32) -> Result<u64> {
        let cutoff = cutoff(older_than_days);
        let _guard = self.write_lock.lock().await;
        let mut deleted = 0;
        for prompt in self.read_all_prompts().await? {
            if prompt.is_active || prompt.updated_at >= cutoff {
                continue;
            }
            let path = self.prompt_path(&prompt.id);
            match fs::remove_file(&path).await {
                Ok(_) => deleted += 1,
                Err(ref e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e).with_context(|| format!("Failed to delete prompt file: {}", path.display())),
            }
        }
        Ok(deleted)
    }
}

#[async_trait]
impl ProfileSource for FileSystemStorage {
    async fn get_profile(&self, user_id: &Uuid) -> Result<Option<UserProfile>> {
        Self::read_json(&self.profile_path(user_id)).await
    }
}

#[async_trait]
impl EntrySource for FileSystemStorage {
    async fn recent_entries(&self, user_id: &Uuid, limit: usize) -> Result<Vec<EntrySummary>> {
        let entries = self.user_entries(user_id).await?;
        Ok(recent_summaries(&entries, user_id, limit))
    }

    async fn count_active_entries(&self, user_id: &Uuid) -> Result<u64> {
        let entries = self.user_entries(user_id).await?;
        Ok(entries.iter().filter(|e| e.user_id == *user_id && e.is_active).count() as u64)
    }
}
