use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

use crate::error::{StoreError, StoreResult};
use crate::models::{Conversation, ConversationListItem, TrainingConfig};
use crate::services::config::get_app_data_dir;

/// The engine's only contract with the persistence layer: whole-document
/// writes keyed by conversation id, listing ordered by `updated_at`
/// descending, and one per-user training-config document. Snapshots flow
/// back to the reconciler regardless of which implementation produced them.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn list(&self) -> StoreResult<Vec<ConversationListItem>>;

    async fn load(&self, id: &str) -> StoreResult<Option<Conversation>>;

    /// Write-whole-document upsert.
    async fn upsert(&self, conversation: &Conversation) -> StoreResult<()>;

    async fn delete(&self, id: &str) -> StoreResult<()>;

    async fn delete_all(&self) -> StoreResult<()>;

    /// Single-field title update.
    async fn rename(&self, id: &str, title: &str) -> StoreResult<()>;

    async fn load_training_config(&self) -> StoreResult<TrainingConfig>;

    async fn save_training_config(&self, config: &TrainingConfig) -> StoreResult<()>;
}

/// One pretty-printed JSON document per conversation under the data dir.
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Store rooted at the platform data directory.
    pub fn open_default() -> StoreResult<Self> {
        Ok(Self::new(get_app_data_dir()?))
    }

    fn conversations_dir(&self) -> PathBuf {
        self.root.join("conversations")
    }

    fn conversation_path(&self, id: &str) -> PathBuf {
        self.conversations_dir().join(format!("{id}.json"))
    }

    fn training_path(&self) -> PathBuf {
        self.root.join("training.json")
    }

    async fn ensure_dirs(&self) -> StoreResult<()> {
        fs::create_dir_all(self.conversations_dir()).await?;
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for JsonFileStore {
    async fn list(&self) -> StoreResult<Vec<ConversationListItem>> {
        self.ensure_dirs().await?;
        let mut items = Vec::new();

        let mut entries = fs::read_dir(self.conversations_dir()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                if let Ok(content) = fs::read_to_string(&path).await {
                    if let Ok(conversation) = serde_json::from_str::<Conversation>(&content) {
                        items.push(ConversationListItem::from(&conversation));
                    }
                }
            }
        }

        items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(items)
    }

    async fn load(&self, id: &str) -> StoreResult<Option<Conversation>> {
        let path = self.conversation_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).await?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    async fn upsert(&self, conversation: &Conversation) -> StoreResult<()> {
        self.ensure_dirs().await?;
        let content = serde_json::to_string_pretty(conversation)?;
        fs::write(self.conversation_path(&conversation.id), content).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let path = self.conversation_path(id);
        if path.exists() {
            fs::remove_file(path).await?;
        }
        Ok(())
    }

    async fn delete_all(&self) -> StoreResult<()> {
        let dir = self.conversations_dir();
        if dir.exists() {
            fs::remove_dir_all(&dir).await?;
        }
        Ok(())
    }

    async fn rename(&self, id: &str, title: &str) -> StoreResult<()> {
        let mut conversation = self
            .load(id)
            .await?
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        conversation.title = title.to_string();
        conversation.touch();
        self.upsert(&conversation).await
    }

    async fn load_training_config(&self) -> StoreResult<TrainingConfig> {
        let path = self.training_path();
        if !path.exists() {
            return Ok(TrainingConfig::default());
        }
        let content = fs::read_to_string(&path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    async fn save_training_config(&self, config: &TrainingConfig) -> StoreResult<()> {
        fs::create_dir_all(&self.root).await?;
        let content = serde_json::to_string_pretty(config)?;
        fs::write(self.training_path(), content).await?;
        Ok(())
    }
}
