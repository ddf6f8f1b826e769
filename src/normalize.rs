//! Message normalization — one content string per inbound message.
//!
//! Text (or caption) wins; otherwise a fixed placeholder names what the
//! message carried. `text_link` entities are spliced back into the text
//! so inline links survive the flattening.

use crate::update::{TelegramEntity, TelegramMessage, TelegramUpdate};

pub const UNSUPPORTED_MESSAGE_PROMPT: &str =
    "Unsupported message type. Please send text or a message with a caption.";
pub const IMAGE_ONLY_PROMPT: &str = "Image from Telegram";
pub const VOICE_ONLY_PROMPT: &str = "Voice memo from Telegram";
pub const DOCUMENT_ONLY_PROMPT: &str = "Document from Telegram";
pub const FORWARDED_EMPTY_PROMPT: &str = "Forwarded message has no text. Please add a note.";

pub fn normalize_update(update: &TelegramUpdate) -> String {
    match update.effective_message() {
        Some(message) => normalize_message(message),
        None => UNSUPPORTED_MESSAGE_PROMPT.to_string(),
    }
}

pub fn normalize_message(message: &TelegramMessage) -> String {
    let mut text = normalized_text(message.text.as_deref(), message.entities.as_deref());
    if text.is_empty() {
        text = normalized_text(message.caption.as_deref(), message.caption_entities.as_deref());
    }
    if !text.is_empty() {
        return text;
    }
    if message.photo.as_ref().is_some_and(|sizes| !sizes.is_empty()) {
        return IMAGE_ONLY_PROMPT.to_string();
    }
    if message.voice.is_some() || message.audio.is_some() {
        return VOICE_ONLY_PROMPT.to_string();
    }
    if let Some(document) = &message.document {
        return match document.file_name.as_deref().filter(|name| !name.is_empty()) {
            Some(name) => format!("File from Telegram: {name}"),
            None => DOCUMENT_ONLY_PROMPT.to_string(),
        };
    }
    if message.is_forwarded() {
        return FORWARDED_EMPTY_PROMPT.to_string();
    }
    UNSUPPORTED_MESSAGE_PROMPT.to_string()
}

fn normalized_text(text: Option<&str>, entities: Option<&[TelegramEntity]>) -> String {
    let Some(text) = text else {
        return String::new();
    };
    if text.is_empty() {
        return String::new();
    }
    match entities {
        Some(entities) if !entities.is_empty() => {
            apply_text_links(text, entities).trim().to_string()
        }
        _ => text.trim().to_string(),
    }
}

/// Insert `" ({url})"` after every `text_link` span.
///
/// One left-to-right pass over the text. Entity offsets count characters;
/// an insertion point behind the cursor or past the end of the string is
/// skipped, which covers overlapping and malformed spans.
fn apply_text_links(text: &str, entities: &[TelegramEntity]) -> String {
    let mut inserts: Vec<(usize, String)> = entities
        .iter()
        .filter(|entity| entity.kind == "text_link")
        .filter_map(|entity| {
            entity
                .url
                .as_deref()
                .filter(|url| !url.is_empty())
                .map(|url| (entity.offset + entity.length, format!(" ({url})")))
        })
        .collect();

    if inserts.is_empty() {
        return text.to_string();
    }
    inserts.sort_by_key(|(position, _)| *position);

    // Character position -> byte offset, with the one-past-the-end slot.
    let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    boundaries.push(text.len());
    let char_len = boundaries.len() - 1;

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0usize;
    for (position, snippet) in &inserts {
        if *position < cursor || *position > char_len {
            continue;
        }
        out.push_str(&text[boundaries[cursor]..boundaries[*position]]);
        out.push_str(snippet);
        cursor = *position;
    }
    out.push_str(&text[boundaries[cursor]..]);
    out
}

// ── Tests ───────────────────────────────────────────────────────────
