use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::Message;

/// A persisted conversation thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(title: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Bump `updated_at`. The field is the sole staleness marker for
    /// reconciliation, so it must never move backwards even if the wall
    /// clock does.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.updated_at {
            self.updated_at = now;
        }
    }
}

/// Lightweight listing entry, loaded without message history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationListItem {
    pub id: String,
    pub title: String,
    pub message_count: usize,
    pub updated_at: DateTime<Utc>,
}

impl From<&Conversation> for ConversationListItem {
    fn from(conversation: &Conversation) -> Self {
        Self {
            id: conversation.id.clone(),
            title: conversation.title.clone(),
            message_count: conversation.messages.len(),
            updated_at: conversation.updated_at,
        }
    }
}

/// Per-user persona override. When disabled it must not influence the
/// generated system instructions at all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingConfig {
    #[serde(default)]
    pub identity: String,
    #[serde(default)]
    pub objectives: String,
    #[serde(default)]
    pub constraints: String,
    #[serde(default)]
    pub tone: String,
    #[serde(default)]
    pub is_enabled: bool,
}
