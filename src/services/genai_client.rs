use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{BackendError, ConfigError};
use crate::models::{Attachment, AttachmentKind};
use crate::services::backend::{
    AudioRequest, GenerativeBackend, GroundingChunk, InlineData, Part, TextRequest, TextReply,
    Turn, TurnRole, VideoOperation, VideoPoll, FAST_MODEL, IMAGE_MODEL, TTS_MODEL, VIDEO_MODEL,
};
use crate::services::config::load_config;

const TITLE_PROMPT: &str = "Reply with a short title (5 words or fewer) for a \
conversation that starts with the following message. Title only, no quotes.";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Turn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speech_config: Option<SpeechConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    voice_config: VoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig {
    voice_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    #[serde(skip_serializing_if = "Option::is_none")]
    google_search: Option<EmptyConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    google_maps: Option<EmptyConfig>,
}

#[derive(Debug, Serialize)]
struct EmptyConfig {}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CandidatePart {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct OperationStatus {
    name: String,
    #[serde(default)]
    done: bool,
    error: Option<OperationError>,
    response: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OperationError {
    #[serde(default)]
    message: String,
}

/// Append the API key to a generated-media locator so the caller can fetch
/// it directly.
fn attach_key(uri: &str, api_key: &str) -> String {
    if uri.contains('?') {
        format!("{uri}&key={api_key}")
    } else {
        format!("{uri}?key={api_key}")
    }
}

/// HTTP client for a Gemini-style generative language API.
pub struct GenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GenAiClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(300)) // 5 minute timeout for long generations
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Create a client from the persisted configuration.
    pub fn from_config() -> Result<Self, ConfigError> {
        let config = load_config()?;
        let (base_url, api_key, _voice) = config.effective()?;
        Ok(Self::new(&base_url, &api_key))
    }

    fn model_url(&self, model: &str, verb: &str) -> String {
        format!("{}/models/{}:{}?key={}", self.base_url, model, verb, self.api_key)
    }

    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, BackendError> {
        let response = self
            .client
            .post(self.model_url(model, "generateContent"))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(BackendError::Api { status, message });
        }

        Ok(response.json().await?)
    }
}

fn first_candidate(response: GenerateContentResponse) -> Result<Candidate, BackendError> {
    response
        .candidates
        .into_iter()
        .next()
        .ok_or(BackendError::MissingPayload)
}

fn candidate_text(candidate: &Candidate) -> String {
    candidate
        .content
        .as_ref()
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|part| part.text.as_deref())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

fn candidate_inline_data(candidate: Candidate) -> Option<InlineData> {
    candidate
        .content?
        .parts
        .into_iter()
        .find_map(|part| part.inline_data)
}

#[async_trait]
impl GenerativeBackend for GenAiClient {
    async fn generate_text(&self, request: TextRequest) -> Result<TextReply, BackendError> {
        let tools = request.grounding.then(|| {
            vec![
                Tool { google_search: Some(EmptyConfig {}), google_maps: None },
                Tool { google_search: None, google_maps: Some(EmptyConfig {}) },
            ]
        });

        let body = GenerateContentRequest {
            contents: request.turns,
            system_instruction: Some(SystemInstruction {
                parts: vec![Part::text(&request.system_instruction)],
            }),
            generation_config: Some(GenerationConfig {
                temperature: Some(request.temperature),
                thinking_config: request
                    .thinking_budget
                    .map(|thinking_budget| ThinkingConfig { thinking_budget }),
                ..Default::default()
            }),
            tools,
        };

        let candidate = first_candidate(self.generate_content(&request.model, &body).await?)?;
        let grounding = candidate
            .grounding_metadata
            .as_ref()
            .map(|metadata| metadata.grounding_chunks.clone())
            .unwrap_or_default();

        Ok(TextReply { text: candidate_text(&candidate), grounding })
    }

    async fn generate_audio(&self, request: AudioRequest) -> Result<String, BackendError> {
        let body = GenerateContentRequest {
            contents: request.turns,
            system_instruction: Some(SystemInstruction {
                parts: vec![Part::text(&request.system_instruction)],
            }),
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["AUDIO".to_string()]),
                speech_config: Some(SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig { voice_name: request.voice },
                    },
                }),
                ..Default::default()
            }),
            tools: None,
        };

        let candidate = first_candidate(self.generate_content(TTS_MODEL, &body).await?)?;
        candidate_inline_data(candidate)
            .map(|inline| inline.data)
            .ok_or(BackendError::MissingPayload)
    }

    async fn generate_image(
        &self,
        prompt: &str,
        reference: Option<&Attachment>,
    ) -> Result<Attachment, BackendError> {
        let mut parts = Vec::new();
        if let Some(attachment) = reference {
            if let Some(data) = &attachment.data {
                parts.push(Part::inline(&attachment.mime_type, data));
            }
        }
        parts.push(Part::text(prompt));

        let body = GenerateContentRequest {
            contents: vec![Turn { role: TurnRole::User, parts }],
            system_instruction: None,
            generation_config: None,
            tools: None,
        };

        let candidate = first_candidate(self.generate_content(IMAGE_MODEL, &body).await?)?;
        let inline = candidate_inline_data(candidate).ok_or(BackendError::MissingPayload)?;
        Ok(Attachment::inline(AttachmentKind::Image, &inline.mime_type, inline.data))
    }

    async fn start_video_generation(&self, prompt: &str) -> Result<VideoOperation, BackendError> {
        let body = serde_json::json!({ "instances": [{ "prompt": prompt }] });

        let response = self
            .client
            .post(self.model_url(VIDEO_MODEL, "predictLongRunning"))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(BackendError::Api { status, message });
        }

        let operation: OperationStatus = response.json().await?;
        debug!(operation = %operation.name, "video generation started");
        Ok(VideoOperation { name: operation.name })
    }

    async fn poll_video_generation(
        &self,
        operation: &VideoOperation,
    ) -> Result<VideoPoll, BackendError> {
        let url = format!("{}/{}?key={}", self.base_url, operation.name, self.api_key);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(BackendError::Api { status, message });
        }

        let status: OperationStatus = response.json().await?;
        if !status.done {
            return Ok(VideoPoll::Pending(operation.clone()));
        }

        if let Some(error) = status.error {
            return Err(BackendError::OperationFailed { message: error.message });
        }

        let uri = status
            .response
            .as_ref()
            .and_then(|r| r.pointer("/generateVideoResponse/generatedSamples/0/video/uri"))
            .and_then(|v| v.as_str())
            .ok_or(BackendError::MissingPayload)?;

        Ok(VideoPoll::Complete { uri: attach_key(uri, &self.api_key) })
    }

    async fn generate_title(&self, first_message: &str) -> Result<String, BackendError> {
        let prompt = format!("{TITLE_PROMPT}\n\n{first_message}");
        let body = GenerateContentRequest {
            contents: vec![Turn {
                role: TurnRole::User,
                parts: vec![Part::text(&prompt)],
            }],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                temperature: Some(0.4),
                ..Default::default()
            }),
            tools: None,
        };

        let candidate = first_candidate(self.generate_content(FAST_MODEL, &body).await?)?;
        Ok(candidate_text(&candidate))
    }
}
