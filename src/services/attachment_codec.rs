use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::error::CodecError;
use crate::models::{Attachment, AttachmentKind};

/// Filename extensions accepted as text when the declared MIME type is
/// absent or unreliable.
const TEXT_EXTENSIONS: [&str; 11] = [
    "json", "js", "ts", "jsx", "tsx", "py", "md", "csv", "xml", "html", "css",
];

fn extension_of(name: &str) -> Option<String> {
    name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())
}

fn is_text_like_name(name: &str) -> bool {
    extension_of(name)
        .map(|ext| TEXT_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Classify a file into a transport kind and a best-effort MIME type.
///
/// Declared MIME type wins; filename-extension sniffing covers the fixed
/// text-like allow-list when the type is missing or generic. Anything that
/// matches neither is rejected.
pub fn classify(declared_mime: Option<&str>, name: &str) -> Result<(AttachmentKind, String), CodecError> {
    let declared = declared_mime
        .map(str::trim)
        .filter(|m| !m.is_empty() && *m != "application/octet-stream");

    if let Some(mime) = declared {
        if mime.starts_with("image/") {
            return Ok((AttachmentKind::Image, mime.to_string()));
        }
        if mime.starts_with("video/") {
            return Ok((AttachmentKind::Video, mime.to_string()));
        }
        if mime.starts_with("audio/") {
            return Ok((AttachmentKind::Audio, mime.to_string()));
        }
        if mime == "application/pdf" || mime.starts_with("text/") {
            return Ok((AttachmentKind::File, mime.to_string()));
        }
        if is_text_like_name(name) {
            return Ok((AttachmentKind::File, mime.to_string()));
        }
        return Err(CodecError::UnsupportedFormat { name: name.to_string() });
    }

    if is_text_like_name(name) {
        return Ok((AttachmentKind::File, "text/plain".to_string()));
    }

    Err(CodecError::UnsupportedFormat { name: name.to_string() })
}

/// Normalize a raw file into a transport-ready attachment with a
/// base64-encoded payload. Pure transform, no I/O.
pub fn encode(name: &str, declared_mime: Option<&str>, bytes: &[u8]) -> Result<Attachment, CodecError> {
    let (kind, mime_type) = classify(declared_mime, name)?;
    let mut attachment = Attachment::inline(kind, &mime_type, BASE64.encode(bytes));
    attachment.name = Some(name.to_string());
    Ok(attachment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_declared_mime() {
        assert_eq!(classify(Some("image/png"), "photo.png").unwrap().0, AttachmentKind::Image);
        assert_eq!(classify(Some("video/mp4"), "clip.mp4").unwrap().0, AttachmentKind::Video);
        assert_eq!(classify(Some("audio/wav"), "note.wav").unwrap().0, AttachmentKind::Audio);
        assert_eq!(classify(Some("application/pdf"), "doc.pdf").unwrap().0, AttachmentKind::File);
        assert_eq!(classify(Some("text/markdown"), "notes.md").unwrap().0, AttachmentKind::File);
    }

    #[test]
    fn sniffs_text_extensions_without_mime() {
        let (kind, mime) = classify(None, "config.json").unwrap();
        assert_eq!(kind, AttachmentKind::File);
        assert_eq!(mime, "text/plain");

        // Generic binary types defer to the extension too.
        let (kind, _) = classify(Some("application/octet-stream"), "script.py").unwrap();
        assert_eq!(kind, AttachmentKind::File);
    }

    #[test]
    fn rejects_unknown_formats() {
        assert!(classify(None, "archive.zip").is_err());
        assert!(classify(Some("application/zip"), "archive.zip").is_err());
        assert!(classify(None, "no_extension").is_err());
    }

    #[test]
    fn encode_produces_inline_payload() {
        let attachment = encode("hello.md", None, b"# hi").unwrap();
        assert_eq!(attachment.kind, AttachmentKind::File);
        assert_eq!(attachment.mime_type, "text/plain");
        assert_eq!(attachment.data.as_deref(), Some("IyBoaQ=="));
        assert_eq!(attachment.name.as_deref(), Some("hello.md"));
        assert!(attachment.has_payload());
    }
}
