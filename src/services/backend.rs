use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::BackendError;
use crate::models::Attachment;

// Model roster. Selection between them is the orchestrator's job; the
// backend only needs to know which identifier to hit.
pub const FAST_MODEL: &str = "gemini-2.5-flash";
pub const THINKING_MODEL: &str = "gemini-2.5-pro";
pub const TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";
pub const IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const VIDEO_MODEL: &str = "veo-2.0-generate-001";

pub const DEFAULT_VOICE: &str = "Charon";
pub const VIDEO_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Extended internal reasoning budget requested in deep mode, in tokens.
pub const DEEP_THINKING_BUDGET: u32 = 24_576;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

/// One piece of a turn: either text or an inline binary payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

impl Part {
    pub fn text(text: &str) -> Self {
        Self::Text { text: text.to_string() }
    }

    pub fn inline(mime_type: &str, data: &str) -> Self {
        Self::Inline {
            inline_data: InlineData {
                mime_type: mime_type.to_string(),
                data: data.to_string(),
            },
        }
    }
}

/// One role-attributed unit of input/output exchanged with the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone)]
pub struct TextRequest {
    pub model: String,
    pub turns: Vec<Turn>,
    pub system_instruction: String,
    pub temperature: f32,
    /// Extended reasoning budget; `None` leaves the model's default.
    pub thinking_budget: Option<u32>,
    /// Enable web/maps grounding tools.
    pub grounding: bool,
}

#[derive(Debug, Clone)]
pub struct AudioRequest {
    pub turns: Vec<Turn>,
    pub system_instruction: String,
    pub voice: String,
}

/// Evidence reference returned alongside a grounded reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroundingChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web: Option<GroundingSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maps: Option<GroundingSource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundingSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub uri: String,
}

#[derive(Debug, Clone)]
pub struct TextReply {
    pub text: String,
    pub grounding: Vec<GroundingChunk>,
}

/// Opaque handle for a long-running video generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoOperation {
    pub name: String,
}

#[derive(Debug, Clone)]
pub enum VideoPoll {
    Pending(VideoOperation),
    /// Remote locator, with access credentials already attached.
    Complete { uri: String },
}

/// Everything the engine needs from a hosted generative service. The core
/// depends only on this shape, not on any particular transport.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    async fn generate_text(&self, request: TextRequest) -> Result<TextReply, BackendError>;

    /// Returns a base64-encoded audio payload.
    async fn generate_audio(&self, request: AudioRequest) -> Result<String, BackendError>;

    /// Generate an image, optionally conditioned on a reference attachment.
    async fn generate_image(
        &self,
        prompt: &str,
        reference: Option<&Attachment>,
    ) -> Result<Attachment, BackendError>;

    async fn start_video_generation(&self, prompt: &str) -> Result<VideoOperation, BackendError>;

    async fn poll_video_generation(
        &self,
        operation: &VideoOperation,
    ) -> Result<VideoPoll, BackendError>;

    async fn generate_title(&self, first_message: &str) -> Result<String, BackendError>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::models::AttachmentKind;
    use std::sync::Mutex;

    /// Scriptable backend for orchestrator and dispatcher tests.
    pub(crate) struct MockBackend {
        pub text_reply: String,
        pub grounding: Vec<GroundingChunk>,
        pub fail_text: bool,
        pub fail_text_message: String,
        pub fail_audio: bool,
        pub fail_image: bool,
        pub fail_video: bool,
        /// How many pending polls before the video completes.
        pub video_polls_before_complete: usize,
        pub text_requests: Mutex<Vec<TextRequest>>,
        pub audio_requests: Mutex<Vec<AudioRequest>>,
        pub image_calls: Mutex<Vec<(String, bool)>>,
        pub poll_count: Mutex<usize>,
    }

    impl Default for MockBackend {
        fn default() -> Self {
            Self {
                text_reply: "mock reply".to_string(),
                grounding: Vec::new(),
                fail_text: false,
                fail_text_message: "API error (500): mock failure".to_string(),
                fail_audio: false,
                fail_image: false,
                fail_video: false,
                video_polls_before_complete: 0,
                text_requests: Mutex::new(Vec::new()),
                audio_requests: Mutex::new(Vec::new()),
                image_calls: Mutex::new(Vec::new()),
                poll_count: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl GenerativeBackend for MockBackend {
        async fn generate_text(&self, request: TextRequest) -> Result<TextReply, BackendError> {
            self.text_requests.lock().unwrap().push(request);
            if self.fail_text {
                return Err(BackendError::OperationFailed {
                    message: self.fail_text_message.clone(),
                });
            }
            Ok(TextReply {
                text: self.text_reply.clone(),
                grounding: self.grounding.clone(),
            })
        }

        async fn generate_audio(&self, request: AudioRequest) -> Result<String, BackendError> {
            self.audio_requests.lock().unwrap().push(request);
            if self.fail_audio {
                return Err(BackendError::MissingPayload);
            }
            Ok("bW9jayBhdWRpbw==".to_string())
        }

        async fn generate_image(
            &self,
            prompt: &str,
            reference: Option<&Attachment>,
        ) -> Result<Attachment, BackendError> {
            self.image_calls
                .lock()
                .unwrap()
                .push((prompt.to_string(), reference.is_some()));
            if self.fail_image {
                return Err(BackendError::MissingPayload);
            }
            Ok(Attachment::inline(
                AttachmentKind::Image,
                "image/png",
                "bW9jayBpbWFnZQ==".to_string(),
            ))
        }

        async fn start_video_generation(
            &self,
            _prompt: &str,
        ) -> Result<VideoOperation, BackendError> {
            if self.fail_video {
                return Err(BackendError::OperationFailed {
                    message: "video model unavailable".to_string(),
                });
            }
            Ok(VideoOperation { name: "operations/mock-video".to_string() })
        }

        async fn poll_video_generation(
            &self,
            operation: &VideoOperation,
        ) -> Result<VideoPoll, BackendError> {
            let mut count = self.poll_count.lock().unwrap();
            *count += 1;
            if *count <= self.video_polls_before_complete {
                return Ok(VideoPoll::Pending(operation.clone()));
            }
            Ok(VideoPoll::Complete {
                uri: "https://files.example/video.mp4?key=mock".to_string(),
            })
        }

        async fn generate_title(&self, _first_message: &str) -> Result<String, BackendError> {
            if self.fail_text {
                return Err(BackendError::MissingPayload);
            }
            Ok("\"Mock Title\"".to_string())
        }
    }
}
