//! Inbound Telegram update payloads.
//!
//! View models for the fields the relay acts on; everything else in the
//! webhook body is ignored during deserialization.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default)]
    pub is_bot: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// A span annotation over `text` or `caption`.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramEntity {
    #[serde(rename = "type")]
    pub kind: String,
    /// Offset in characters from the start of the annotated string.
    pub offset: usize,
    /// Span length in characters.
    pub length: usize,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramPhotoSize {
    pub file_id: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramVoice {
    pub file_id: String,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramAudio {
    pub file_id: String,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramDocument {
    pub file_id: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    #[serde(default)]
    pub date: Option<i64>,
    #[serde(default)]
    pub chat: Option<TelegramChat>,
    #[serde(default, rename = "from")]
    pub from: Option<TelegramUser>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub entities: Option<Vec<TelegramEntity>>,
    #[serde(default)]
    pub caption_entities: Option<Vec<TelegramEntity>>,
    #[serde(default)]
    pub photo: Option<Vec<TelegramPhotoSize>>,
    #[serde(default)]
    pub voice: Option<TelegramVoice>,
    #[serde(default)]
    pub audio: Option<TelegramAudio>,
    #[serde(default)]
    pub document: Option<TelegramDocument>,
    #[serde(default)]
    pub forward_from: Option<TelegramUser>,
    #[serde(default)]
    pub forward_from_chat: Option<TelegramChat>,
    #[serde(default)]
    pub forward_sender_name: Option<String>,
    #[serde(default)]
    pub forward_origin: Option<serde_json::Value>,
}

impl TelegramMessage {
    /// Any forward marker counts: the message was relayed from elsewhere.
    pub fn is_forwarded(&self) -> bool {
        self.forward_from.is_some()
            || self.forward_from_chat.is_some()
            || self.forward_sender_name.is_some()
            || self.forward_origin.is_some()
    }

    /// Whether the message carries any non-empty text or caption.
    pub fn has_text_content(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.is_empty())
            || self.caption.as_deref().is_some_and(|c| !c.is_empty())
    }

    /// The voice or audio attachment, if any, as `(file_id, mime_type)`.
    /// Voice defaults to `audio/ogg`, audio to `audio/mpeg`.
    pub fn audio_attachment(&self) -> Option<(&str, &str)> {
        if let Some(voice) = &self.voice {
            return Some((
                voice.file_id.as_str(),
                voice.mime_type.as_deref().unwrap_or("audio/ogg"),
            ));
        }
        if let Some(audio) = &self.audio {
            return Some((
                audio.file_id.as_str(),
                audio.mime_type.as_deref().unwrap_or("audio/mpeg"),
            ));
        }
        None
    }

    /// The largest photo size (Telegram orders sizes ascending).
    pub fn largest_photo(&self) -> Option<&TelegramPhotoSize> {
        self.photo.as_ref().and_then(|sizes| sizes.last())
    }
}

/// One inbound delivery. `update_id` is the dedupe key.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
    #[serde(default)]
    pub edited_message: Option<TelegramMessage>,
    #[serde(default)]
    pub channel_post: Option<TelegramMessage>,
    #[serde(default)]
    pub edited_channel_post: Option<TelegramMessage>,
}

impl TelegramUpdate {
    /// The message this update carries, whichever slot it arrived in.
    pub fn effective_message(&self) -> Option<&TelegramMessage> {
        self.message
            .as_ref()
            .or(self.edited_message.as_ref())
            .or(self.channel_post.as_ref())
            .or(self.edited_channel_post.as_ref())
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_minimal_update() {
        let update: TelegramUpdate = serde_json::from_value(serde_json::json!({
            "update_id": 1,
            "message": {"message_id": 10, "text": "hi"},
        }))
        .unwrap();
        assert_eq!(update.update_id, 1);
        assert_eq!(
            update.effective_message().and_then(|m| m.text.as_deref()),
            Some("hi")
        );
    }

    #[test]
    fn ignores_unknown_fields() {
        let update: TelegramUpdate = serde_json::from_value(serde_json::json!({
            "update_id": 2,
            "message": {
                "message_id": 11,
                "text": "hi",
                "sticker": {"file_id": "s1"},
                "reply_markup": {},
            },
        }))
        .unwrap();
        assert!(update.message.is_some());
    }

    #[test]
    fn effective_message_prefers_message_slot() {
        let update: TelegramUpdate = serde_json::from_value(serde_json::json!({
            "update_id": 3,
            "message": {"message_id": 1, "text": "a"},
            "channel_post": {"message_id": 2, "text": "b"},
        }))
        .unwrap();
        assert_eq!(
            update.effective_message().and_then(|m| m.text.as_deref()),
            Some("a")
        );
    }

    #[test]
    fn effective_message_falls_back_to_channel_post() {
        let update: TelegramUpdate = serde_json::from_value(serde_json::json!({
            "update_id": 4,
            "channel_post": {"message_id": 2, "text": "b"},
        }))
        .unwrap();
        assert_eq!(
            update.effective_message().and_then(|m| m.text.as_deref()),
            Some("b")
        );
    }

    #[test]
    fn forward_markers_flag_message_as_forwarded() {
        let message = TelegramMessage {
            forward_sender_name: Some("Alice".into()),
            ..Default::default()
        };
        assert!(message.is_forwarded());

        let message = TelegramMessage {
            forward_origin: Some(serde_json::json!({"type": "hidden_user"})),
            ..Default::default()
        };
        assert!(message.is_forwarded());

        assert!(!TelegramMessage::default().is_forwarded());
    }

    #[test]
    fn empty_text_does_not_count_as_content() {
        let message = TelegramMessage {
            text: Some(String::new()),
            ..Default::default()
        };
        assert!(!message.has_text_content());
    }

    #[test]
    fn voice_attachment_defaults_mime_type() {
        let message = TelegramMessage {
            voice: Some(TelegramVoice {
                file_id: "v1".into(),
                duration: Some(2),
                mime_type: None,
            }),
            ..Default::default()
        };
        assert_eq!(message.audio_attachment(), Some(("v1", "audio/ogg")));
    }

    #[test]
    fn audio_attachment_defaults_mime_type() {
        let message = TelegramMessage {
            audio: Some(TelegramAudio {
                file_id: "a1".into(),
                duration: None,
                mime_type: None,
            }),
            ..Default::default()
        };
        assert_eq!(message.audio_attachment(), Some(("a1", "audio/mpeg")));
    }

    #[test]
    fn largest_photo_is_last_size() {
        let message = TelegramMessage {
            photo: Some(vec![
                TelegramPhotoSize {
                    file_id: "small".into(),
                    width: Some(90),
                    height: Some(90),
                },
                TelegramPhotoSize {
                    file_id: "large".into(),
                    width: Some(320),
                    height: Some(320),
                },
            ]),
            ..Default::default()
        };
        assert_eq!(
            message.largest_photo().map(|p| p.file_id.as_str()),
            Some("large")
        );
    }
}
