use regex::Regex;

use crate::models::{Message, Role};
use crate::services::backend::{Part, Turn, TurnRole};

/// Strip internal directive markup and any embedded citation block from
/// message content. These are presentation and side-effect artifacts; the
/// backend must never see them echoed back as semantic content.
pub fn sanitize_text(content: &str) -> String {
    let directive_re = Regex::new(
        r"\[(GENERATE_IMAGE|EDIT_IMAGE|GENERATE_VIDEO|GENERATE_REPORT|GENERATE_DOC|GENERATE_SHEET):\s*.+?\]",
    )
    .unwrap();
    let grounding_re = Regex::new(r"(?s):::GROUNDING=.*?:::").unwrap();

    let without_directives = directive_re.replace_all(content, "");
    let without_grounding = grounding_re.replace_all(&without_directives, "");
    without_grounding.trim().to_string()
}

fn project_role(role: Role) -> TurnRole {
    match role {
        Role::User => TurnRole::User,
        Role::Assistant => TurnRole::Model,
    }
}

/// Linearize the stored message list into a backend-ready turn sequence.
///
/// Each message is sanitized and projected to parts (inline attachment data
/// is replayed for user turns only); zero-part messages are dropped;
/// adjacent same-role turns are merged; a non-`user` leading turn is
/// removed. The output, if non-empty, starts with `user` and never holds
/// two consecutive turns of the same role.
pub fn normalize_history(messages: &[Message]) -> Vec<Turn> {
    let mut turns: Vec<Turn> = Vec::new();

    for message in messages {
        let mut parts = Vec::new();

        if message.role == Role::User {
            for attachment in &message.attachments {
                if let Some(data) = &attachment.data {
                    parts.push(Part::inline(&attachment.mime_type, data));
                }
            }
        }

        let text = sanitize_text(&message.content);
        if !text.is_empty() {
            parts.push(Part::text(&text));
        }

        if parts.is_empty() {
            continue;
        }

        let role = project_role(message.role);
        match turns.last_mut() {
            Some(last) if last.role == role => last.parts.extend(parts),
            _ => turns.push(Turn { role, parts }),
        }
    }

    // Merge already collapsed runs, so one drop is enough to guarantee a
    // `user` opening.
    if turns.first().map(|t| t.role) == Some(TurnRole::Model) {
        turns.remove(0);
    }

    turns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Attachment, AttachmentKind};

    fn user(content: &str) -> Message {
        Message::user(content, Vec::new())
    }

    fn assistant(content: &str) -> Message {
        Message::assistant(content)
    }

    fn assert_alternation(turns: &[Turn]) {
        if let Some(first) = turns.first() {
            assert_eq!(first.role, TurnRole::User);
        }
        for pair in turns.windows(2) {
            assert_ne!(pair[0].role, pair[1].role);
        }
    }

    #[test]
    fn sanitize_strips_directives_and_grounding() {
        let raw = "[GENERATE_IMAGE: a cat] Here you go [GENERATE_SHEET: Budget]\n:::GROUNDING=[{\"uri\":\"https://a\"}]:::";
        assert_eq!(sanitize_text(raw), "Here you go");
    }

    #[test]
    fn sanitize_is_idempotent_on_clean_text() {
        let clean = "Plain answer with [brackets] but no tags.";
        assert_eq!(sanitize_text(clean), clean);
        assert_eq!(sanitize_text(&sanitize_text(clean)), sanitize_text(clean));
    }

    #[test]
    fn directive_stripping_scenario() {
        let history = vec![user("hi"), assistant("[GENERATE_IMAGE: a cat] Here you go")];
        let turns = normalize_history(&history);

        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, TurnRole::User);
        assert_eq!(turns[0].parts, vec![Part::text("hi")]);
        assert_eq!(turns[1].role, TurnRole::Model);
        assert_eq!(turns[1].parts, vec![Part::text("Here you go")]);
    }

    #[test]
    fn merges_consecutive_same_role_messages() {
        let history = vec![user("one"), user("two"), assistant("reply"), assistant("more")];
        let turns = normalize_history(&history);

        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].parts.len(), 2);
        assert_eq!(turns[1].parts.len(), 2);
        assert_alternation(&turns);
    }

    #[test]
    fn drops_leading_assistant_turn() {
        let history = vec![assistant("welcome"), user("hi"), assistant("reply")];
        let turns = normalize_history(&history);

        assert_eq!(turns.len(), 2);
        assert_alternation(&turns);
    }

    #[test]
    fn drops_messages_that_sanitize_to_nothing() {
        let history = vec![
            user("hi"),
            assistant("[GENERATE_VIDEO: a storm]"),
            user("anything there?"),
        ];
        let turns = normalize_history(&history);

        // The empty assistant turn vanishes, and the two user turns merge.
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, TurnRole::User);
        assert_eq!(turns[0].parts.len(), 2);
    }

    #[test]
    fn replays_user_attachment_data_only() {
        let mut with_attachment = user("look at this");
        with_attachment.attachments.push(Attachment::inline(
            AttachmentKind::Image,
            "image/png",
            "cGl4ZWxz".to_string(),
        ));

        let mut assistant_media = assistant("made you something");
        assistant_media.generated_media.push(Attachment::remote(
            AttachmentKind::Video,
            "video/mp4",
            "https://files.example/v.mp4".to_string(),
        ));

        let turns = normalize_history(&[with_attachment, assistant_media]);
        assert_eq!(turns[0].parts.len(), 2);
        assert!(matches!(turns[0].parts[0], Part::Inline { .. }));
        // Assistant-authored media is never replayed as input.
        assert_eq!(turns[1].parts, vec![Part::text("made you something")]);
    }

    #[test]
    fn alternation_invariant_holds_for_messy_input() {
        let history = vec![
            assistant("stray opener"),
            assistant("[GENERATE_DOC: Notes]"),
            user(""),
            user("first real question"),
            assistant("answer"),
            user("follow up"),
            user("and another"),
        ];
        let turns = normalize_history(&history);
        assert!(!turns.is_empty());
        assert_alternation(&turns);
    }
}
