use crate::error::ExtractionError;
use mail_parser::{Message, MessageParser, MimeHeaders, PartType};
use std::path::Path;

/// Plain-text body of an `.eml` file, paginated into `chars_per_page` chunks
/// and joined back together.
pub fn extract_email_text(path: &Path, chars_per_page: usize) -> Result<String, ExtractionError> {
    let raw = std::fs::read(path).map_err(|e| ExtractionError::filesystem(path, e))?;
    let message = MessageParser::default()
        .parse(&raw)
        .ok_or_else(|| ExtractionError::decode(path, "not an RFC 822 message"))?;

    let body = plain_text_body(&message);
    let pages = paginate(&body, chars_per_page);
    tracing::debug!(path = %path.display(), pages = pages.len(), "extracted email body");
    Ok(pages.concat())
}

/// First `text/plain` part, else whatever text body the parser can render
pub fn plain_text_body(message: &Message) -> String {
    let first_plain = message.parts.iter().find_map(|part| {
        let is_plain = part
            .content_type()
            .map(|ct| {
                ct.ctype().eq_ignore_ascii_case("text")
                    && ct.subtype().map_or(true, |s| s.eq_ignore_ascii_case("plain"))
            })
            .unwrap_or(true);
        match &part.body {
            PartType::Text(text) if is_plain => Some(text.to_string()),
            _ => None,
        }
    });

    first_plain
        .or_else(|| message.body_text(0).map(|s| s.to_string()))
        .unwrap_or_default()
}

/// Split into chunks of at most `chars_per_page` characters
pub fn paginate(text: &str, chars_per_page: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let size = chars_per_page.max(1);
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size).map(|chunk| chunk.iter().collect()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MULTIPART: &str = "From: adjuster@example.com\r\n\
To: intake@example.com\r\n\
Subject: Claim 4471 follow-up\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/alternative; boundary=\"b1\"\r\n\
\r\n\
--b1\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<p>HTML version</p>\r\n\
--b1\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Plain version of the follow-up.\r\n\
--b1--\r\n";

    #[test]
    fn test_multipart_prefers_plain_part() {
        let message = MessageParser::default().parse(MULTIPART.as_bytes()).unwrap();
        let body = plain_text_body(&message);
        assert!(body.starts_with("Plain version of the follow-up."));
        assert!(!body.contains("HTML version"));
    }

    #[test]
    fn test_single_part_body() {
        let raw = "From: a@example.com\r\nSubject: hi\r\n\r\nPolice report attached.\r\n";
        let message = MessageParser::default().parse(raw.as_bytes()).unwrap();
        assert!(plain_text_body(&message).starts_with("Police report attached."));
    }

    #[test]
    fn test_paginate_is_char_safe() {
        let pages = paginate("ééééé", 2);
        assert_eq!(pages, vec!["éé", "éé", "é"]);
        assert!(paginate("", 1000).is_empty());
    }

    #[test]
    fn test_extract_email_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("followup.eml");
        std::fs::write(&path, MULTIPART).unwrap();
        let text = extract_email_text(&path, 10).unwrap();
        assert!(text.starts_with("Plain version of the follow-up."));
    }
}
