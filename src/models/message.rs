use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Video,
    Audio,
    File,
}

/// A binary artifact attached to a message, either user-supplied or produced
/// by media dispatch. Exactly one of `data`/`uri` carries the actual bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    pub mime_type: String,
    /// Base64-encoded payload for inline attachments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Remote locator for generated media too large to inline (video).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// Original filename, used only for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Attachment {
    pub fn inline(kind: AttachmentKind, mime_type: &str, data: String) -> Self {
        Self {
            kind,
            mime_type: mime_type.to_string(),
            data: Some(data),
            uri: None,
            name: None,
        }
    }

    pub fn remote(kind: AttachmentKind, mime_type: &str, uri: String) -> Self {
        Self {
            kind,
            mime_type: mime_type.to_string(),
            data: None,
            uri: Some(uri),
            name: None,
        }
    }

    /// An attachment is dispatchable only when exactly one of `data`/`uri`
    /// is present.
    pub fn has_payload(&self) -> bool {
        self.data.is_some() != self.uri.is_some()
    }
}

/// Immutable snapshot of one regeneration outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageVersion {
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub generated_media: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_data: Option<String>,
}

/// One conversational turn. Created once and left immutable, except that
/// assistant messages may be regenerated, which appends to `versions` and
/// swaps the display fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub generated_media: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_data: Option<String>,
    /// Present once the message has been regenerated at least once.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub versions: Vec<MessageVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_version_index: Option<usize>,
}

impl Message {
    pub fn user(content: &str, attachments: Vec<Attachment>) -> Self {
        Self::new(Role::User, content, attachments)
    }

    pub fn assistant(content: &str) -> Self {
        Self::new(Role::Assistant, content, Vec::new())
    }

    fn new(role: Role, content: &str, attachments: Vec<Attachment>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
            attachments,
            generated_media: Vec::new(),
            audio_data: None,
            versions: Vec::new(),
            current_version_index: None,
        }
    }

    /// Snapshot the currently displayed fields as a version.
    pub fn current_snapshot(&self) -> MessageVersion {
        MessageVersion {
            content: self.content.clone(),
            timestamp: self.timestamp,
            generated_media: self.generated_media.clone(),
            audio_data: self.audio_data.clone(),
        }
    }

    /// Record a regeneration outcome without destroying prior outputs.
    ///
    /// On the first regeneration the pre-regeneration state is snapshotted
    /// as version 0, so every output the message ever displayed remains
    /// reachable through `versions`.
    pub fn apply_regeneration(&mut self, version: MessageVersion) {
        if self.versions.is_empty() {
            let original = self.current_snapshot();
            self.versions.push(original);
        }
        self.content = version.content.clone();
        self.timestamp = version.timestamp;
        self.generated_media = version.generated_media.clone();
        self.audio_data = version.audio_data.clone();
        self.versions.push(version);
        self.current_version_index = Some(self.versions.len() - 1);
    }

    /// Switch the displayed fields to a previously recorded version.
    /// Out-of-range indices are rejected.
    pub fn select_version(&mut self, index: usize) -> bool {
        let Some(version) = self.versions.get(index) else {
            return false;
        };
        self.content = version.content.clone();
        self.generated_media = version.generated_media.clone();
        self.audio_data = version.audio_data.clone();
        self.current_version_index = Some(index);
        true
    }
}
