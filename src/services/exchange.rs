use tracing::{debug, warn};

use crate::error::ExchangeError;
use crate::models::{Attachment, AttachmentKind, Message, TrainingConfig};
use crate::services::backend::{
    AudioRequest, GenerativeBackend, Part, TextRequest, Turn, TurnRole, DEEP_THINKING_BUDGET,
    DEFAULT_VOICE, FAST_MODEL, THINKING_MODEL,
};
use crate::services::citations::{append_grounding_block, collect_citations};
use crate::services::directives::dispatch_media;
use crate::services::history::normalize_history;
use crate::services::reconciler::SessionToken;

/// Display text substituted when a turn's output is synthesized speech.
pub const AUDIO_PLACEHOLDER: &str = "[Encrypted Audio Transmission]";

/// Shown when the text model returns an empty reply.
const EMPTY_REPLY_PLACEHOLDER: &str = "[No transmission received]";

/// A turn must never go out with zero parts; most backends reject it.
const EMPTY_TURN_PLACEHOLDER: &str = "...";

const TEXT_TEMPERATURE: f32 = 0.3;

const BASE_PERSONA: &str = "You are the handler on a secure backchannel: \
precise, composed, and direct. When an illustration would help, emit \
[GENERATE_IMAGE: <prompt>] or [EDIT_IMAGE: <prompt>] inline; for motion, \
emit [GENERATE_VIDEO: <prompt>]. For deliverable documents use \
[GENERATE_REPORT: <title>], [GENERATE_DOC: <title>] or \
[GENERATE_SHEET: <title>]. Keep each directive on a single line.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputModality {
    Text,
    Audio,
}

/// One user submission, ready for exchange with the backend.
pub struct ExchangeRequest<'a> {
    /// Prior messages, chronological, not including the turn being composed.
    pub history: &'a [Message],
    pub text: &'a str,
    pub attachments: &'a [Attachment],
    pub modality: OutputModality,
    pub deep_mode: bool,
    /// Names of connected integrations the assistant may reference.
    pub integrations: &'a [String],
    pub training: Option<&'a TrainingConfig>,
    pub voice: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct ExchangeOutcome {
    pub text: String,
    pub generated_media: Vec<Attachment>,
    pub audio_data: Option<String>,
}

/// Deterministic model choice. Video input always needs the high-capability
/// model, regardless of the deep flag.
fn select_model(has_video: bool, deep_mode: bool) -> &'static str {
    if has_video || deep_mode {
        THINKING_MODEL
    } else {
        FAST_MODEL
    }
}

/// Assemble system instructions in fixed order: base persona, then the
/// training override (only when enabled), then connected integrations.
fn build_system_instruction(
    training: Option<&TrainingConfig>,
    integrations: &[String],
) -> String {
    let mut instruction = BASE_PERSONA.to_string();

    if let Some(config) = training.filter(|c| c.is_enabled) {
        instruction.push_str(&format!(
            "\n\n--- OPERATOR OVERRIDE ---\n\
             Identity: {}\n\
             Objectives: {}\n\
             Constraints: {}\n\
             Tone: {}\n\
             --- END OVERRIDE ---",
            config.identity, config.objectives, config.constraints, config.tone
        ));
    }

    if !integrations.is_empty() {
        instruction.push_str(&format!(
            "\n\nThe operator has connected these tools, which you are \
             authorized to reference: {}.",
            integrations.join(", ")
        ));
    }

    instruction
}

/// Normalize history and append the new turn's parts. If the normalized
/// history already ends on a `user` turn the new parts merge into it, so
/// the alternation invariant survives the caller adding a user turn of its
/// own.
fn build_turns(history: &[Message], text: &str, attachments: &[Attachment]) -> Vec<Turn> {
    let mut turns = normalize_history(history);

    let mut parts: Vec<Part> = attachments
        .iter()
        .filter_map(|a| a.data.as_ref().map(|data| Part::inline(&a.mime_type, data)))
        .collect();

    if !text.trim().is_empty() {
        parts.push(Part::text(text.trim()));
    }
    if parts.is_empty() {
        parts.push(Part::text(EMPTY_TURN_PLACEHOLDER));
    }

    match turns.last_mut() {
        Some(last) if last.role == TurnRole::User => last.parts.extend(parts),
        _ => turns.push(Turn { role: TurnRole::User, parts }),
    }

    turns
}

/// Run one full turn exchange: pick model and modality, call the backend,
/// and post-process the reply (directive dispatch, then citations).
///
/// A failed audio attempt falls back silently to the text path; a failed
/// text generation is fatal for the turn and surfaces as a normalized,
/// user-presentable message.
pub async fn exchange(
    backend: &dyn GenerativeBackend,
    request: ExchangeRequest<'_>,
    session: &SessionToken,
) -> Result<ExchangeOutcome, ExchangeError> {
    let has_video = request
        .attachments
        .iter()
        .any(|a| a.kind == AttachmentKind::Video);

    let model = select_model(has_video, request.deep_mode);
    let system_instruction = build_system_instruction(request.training, request.integrations);
    let turns = build_turns(request.history, request.text, request.attachments);

    // Video input forces text output for the turn.
    if request.modality == OutputModality::Audio && !has_video {
        let audio_request = AudioRequest {
            turns: turns.clone(),
            system_instruction: system_instruction.clone(),
            voice: request.voice.unwrap_or(DEFAULT_VOICE).to_string(),
        };
        match backend.generate_audio(audio_request).await {
            Ok(audio_data) => {
                return Ok(ExchangeOutcome {
                    text: AUDIO_PLACEHOLDER.to_string(),
                    generated_media: Vec::new(),
                    audio_data: Some(audio_data),
                });
            }
            // The text path below is itself a complete valid response, so
            // this is the one failure that is swallowed rather than
            // surfaced.
            Err(err) => warn!(error = %err, "audio generation failed; falling back to text"),
        }
    }

    debug!(model, deep = request.deep_mode, "dispatching text generation");
    let reply = backend
        .generate_text(TextRequest {
            model: model.to_string(),
            turns,
            system_instruction,
            temperature: TEXT_TEMPERATURE,
            thinking_budget: request.deep_mode.then_some(DEEP_THINKING_BUDGET),
            grounding: true,
        })
        .await
        .map_err(ExchangeError::from_backend)?;

    let text = if reply.text.trim().is_empty() {
        EMPTY_REPLY_PLACEHOLDER.to_string()
    } else {
        reply.text
    };

    let (text, generated_media) =
        dispatch_media(backend, &text, request.attachments, session).await;
    let citations = collect_citations(&reply.grounding);
    let text = append_grounding_block(text.trim(), &citations);

    Ok(ExchangeOutcome {
        text: text.trim().to_string(),
        generated_media,
        audio_data: None,
    })
}

// ============================================================================
// TITLE GENERATION
// ============================================================================

/// Strip quotes and extra lines from a model-produced title.
fn clean_title(raw: &str) -> String {
    let cleaned = raw
        .trim()
        .trim_matches('"')
        .trim_matches('\'')
        .lines()
        .next()
        .unwrap_or("")
        .trim()
        .to_string();

    if cleaned.chars().count() > 60 {
        let truncated: String = cleaned.chars().take(57).collect();
        format!("{}...", truncated)
    } else {
        cleaned
    }
}

/// Fall back to a truncated first message, with "New Chat" as last resort.
fn fallback_title(first_message: &str) -> String {
    let trimmed = first_message.trim();
    if trimmed.is_empty() {
        return "New Chat".to_string();
    }
    let title: String = trimmed.chars().take(50).collect();
    if trimmed.chars().count() > 50 {
        format!("{}...", title)
    } else {
        title
    }
}

/// Derive a short conversation title from the opening message. Never fails;
/// a backend error just falls back to truncation.
pub async fn generate_title(backend: &dyn GenerativeBackend, first_message: &str) -> String {
    match backend.generate_title(first_message).await {
        Ok(raw) => {
            let cleaned = clean_title(&raw);
            if !cleaned.is_empty() {
                return cleaned;
            }
        }
        Err(err) => warn!(error = %err, "title generation failed; using fallback"),
    }
    fallback_title(first_message)
}
