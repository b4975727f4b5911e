use regex::Regex;
use std::ops::Range;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::BackendError;
use crate::models::{Attachment, AttachmentKind};
use crate::services::backend::{GenerativeBackend, VideoPoll, VIDEO_POLL_INTERVAL};
use crate::services::reconciler::SessionToken;

/// Inline markup instructing the client to perform a side-effecting action.
/// The first three are dispatched here; the export tags belong to the
/// document-export layer and pass through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    GenerateImage,
    EditImage,
    GenerateVideo,
    GenerateReport,
    GenerateDoc,
    GenerateSheet,
}

impl DirectiveKind {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "GENERATE_IMAGE" => Some(Self::GenerateImage),
            "EDIT_IMAGE" => Some(Self::EditImage),
            "GENERATE_VIDEO" => Some(Self::GenerateVideo),
            "GENERATE_REPORT" => Some(Self::GenerateReport),
            "GENERATE_DOC" => Some(Self::GenerateDoc),
            "GENERATE_SHEET" => Some(Self::GenerateSheet),
            _ => None,
        }
    }

    /// Whether this engine dispatches the directive itself.
    pub fn is_media(self) -> bool {
        matches!(self, Self::GenerateImage | Self::EditImage | Self::GenerateVideo)
    }
}

/// A directive lifted out of reply text before any side effect runs.
#[derive(Debug, Clone)]
pub struct Directive {
    pub kind: DirectiveKind,
    pub prompt: String,
    pub span: Range<usize>,
}

/// Extract every directive in textual order. Non-greedy, single-line
/// prompts; matching never crosses a newline.
pub fn extract_directives(text: &str) -> Vec<Directive> {
    let re = Regex::new(
        r"\[(GENERATE_IMAGE|EDIT_IMAGE|GENERATE_VIDEO|GENERATE_REPORT|GENERATE_DOC|GENERATE_SHEET):\s*(.+?)\]",
    )
    .unwrap();

    re.captures_iter(text)
        .filter_map(|captures| {
            let whole = captures.get(0)?;
            let kind = DirectiveKind::from_tag(captures.get(1)?.as_str())?;
            let prompt = captures.get(2)?.as_str().trim().to_string();
            Some(Directive { kind, prompt, span: whole.range() })
        })
        .collect()
}

fn remove_spans(text: &str, spans: &[Range<usize>]) -> String {
    let mut output = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in spans {
        output.push_str(&text[cursor..span.start]);
        cursor = span.end;
    }
    output.push_str(&text[cursor..]);
    output
}

/// Drive a long-running video generation to completion, polling at a fixed
/// interval with no hard timeout. A revoked session aborts the wait so a
/// late result is discarded instead of applied.
async fn generate_video(
    backend: &dyn GenerativeBackend,
    prompt: &str,
    session: &SessionToken,
) -> Result<Attachment, BackendError> {
    let mut operation = backend.start_video_generation(prompt).await?;

    loop {
        if !session.is_live() {
            return Err(BackendError::OperationFailed {
                message: "session ended while waiting for video".to_string(),
            });
        }
        sleep(VIDEO_POLL_INTERVAL).await;

        match backend.poll_video_generation(&operation).await? {
            VideoPoll::Pending(next) => operation = next,
            VideoPoll::Complete { uri } => {
                return Ok(Attachment::remote(AttachmentKind::Video, "video/mp4", uri));
            }
        }
    }
}

/// Scan generated reply text for media directives, dispatch each one, and
/// return the text with the matched markup removed plus the collected
/// media.
///
/// A failed item is logged and skipped; its directive text is still removed
/// and processing continues, so one bad illustration never fails the whole
/// reply. Export tags are left in place for the export collaborator.
pub async fn dispatch_media(
    backend: &dyn GenerativeBackend,
    text: &str,
    input_attachments: &[Attachment],
    session: &SessionToken,
) -> (String, Vec<Attachment>) {
    let directives = extract_directives(text);
    let mut media = Vec::new();
    let mut removed_spans = Vec::new();

    for directive in &directives {
        if !directive.kind.is_media() {
            continue;
        }
        removed_spans.push(directive.span.clone());

        if !session.is_live() {
            debug!("session ended; skipping remaining media directives");
            continue;
        }

        let result = match directive.kind {
            DirectiveKind::GenerateImage => {
                backend.generate_image(&directive.prompt, None).await
            }
            DirectiveKind::EditImage => {
                // Reference comes from the turn's own input, not history.
                let reference = input_attachments
                    .iter()
                    .find(|a| a.kind == AttachmentKind::Image && a.data.is_some());
                backend.generate_image(&directive.prompt, reference).await
            }
            DirectiveKind::GenerateVideo => {
                generate_video(backend, &directive.prompt, session).await
            }
            _ => unreachable!("non-media directives are filtered above"),
        };

        match result {
            Ok(attachment) => media.push(attachment),
            // TODO: revisit whether a visible "media unavailable" marker
            // should replace silently dropped items (open question in the
            // current behavior).
            Err(err) => warn!(
                kind = ?directive.kind,
                prompt = %directive.prompt,
                error = %err,
                "media directive failed; continuing without it"
            ),
        }
    }

    (remove_spans(text, &removed_spans), media)
}
