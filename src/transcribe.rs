//! Speech-to-text for voice and audio attachments.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::error::TranscriptionError;

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-lite";
const TRANSCRIBE_INSTRUCTION: &str =
    "Transcribe the speech in this audio. Respond with plain text only.";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Speech-to-text capability.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        audio: &[u8],
        mime_type: &str,
    ) -> Result<String, TranscriptionError>;
}

/// Gemini `generateContent` transcriber with inline base64 audio.
pub struct GeminiTranscriber {
    api_key: SecretString,
    model: String,
    client: reqwest::Client,
}

impl GeminiTranscriber {
    pub fn new(api_key: SecretString, model: Option<String>) -> Self {
        Self {
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{GEMINI_API_BASE}/models/{}:generateContent", self.model)
    }
}

/// Join the text parts of the first candidate, trimmed.
fn extract_transcript(payload: &Value) -> String {
    let parts = payload
        .get("candidates")
        .and_then(|candidates| candidates.get(0))
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(|parts| parts.as_array());
    let Some(parts) = parts else {
        return String::new();
    };
    parts
        .iter()
        .filter_map(|part| part.get("text").and_then(|text| text.as_str()))
        .collect::<String>()
        .trim()
        .to_string()
}

#[async_trait]
impl Transcriber for GeminiTranscriber {
    async fn transcribe(
        &self,
        audio: &[u8],
        mime_type: &str,
    ) -> Result<String, TranscriptionError> {
        if audio.is_empty() {
            return Err(TranscriptionError::EmptyAudio);
        }
        if mime_type.is_empty() {
            return Err(TranscriptionError::MissingMimeType);
        }

        let payload = serde_json::json!({
            "contents": [{
                "parts": [
                    {"text": TRANSCRIBE_INSTRUCTION},
                    {"inline_data": {"mime_type": mime_type, "data": BASE64.encode(audio)}},
                ]
            }]
        });

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&payload)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| TranscriptionError::RequestFailed {
                reason: e.to_string(),
            })?;
        let payload: Value = response
            .json()
            .await
            .map_err(|_| TranscriptionError::InvalidResponse)?;

        let transcript = extract_transcript(&payload);
        if transcript.is_empty() {
            return Err(TranscriptionError::EmptyTranscript);
        }
        Ok(transcript)
    }
}

// ── Tests ───────────────────────────────────────────────────────────
