//! Telegram Bot API — file URL resolution, file download, sender feedback.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::error::TelegramError;

const API_TIMEOUT: Duration = Duration::from_secs(10);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(20);

/// Outbound chat-platform capability.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Resolve a downloadable URL for an uploaded file.
    async fn file_url(&self, file_id: &str) -> Result<String, TelegramError>;

    /// Fetch the raw bytes behind a previously resolved file URL.
    async fn download(&self, file_url: &str) -> Result<Vec<u8>, TelegramError>;

    /// Send a plain-text message to a chat.
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError>;
}

/// Bot API client.
pub struct TelegramClient {
    bot_token: SecretString,
    client: reqwest::Client,
}

impl TelegramClient {
    pub fn new(bot_token: SecretString) -> Self {
        Self {
            bot_token,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "https://api.telegram.org/bot{}/{method}",
            self.bot_token.expose_secret()
        )
    }

    fn file_url_for_path(&self, file_path: &str) -> String {
        format!(
            "https://api.telegram.org/file/bot{}/{file_path}",
            self.bot_token.expose_secret()
        )
    }
}

/// Pull `result.file_path` out of a `getFile` response.
fn file_path_from_payload(payload: &serde_json::Value) -> Result<&str, TelegramError> {
    if !payload.get("ok").and_then(|ok| ok.as_bool()).unwrap_or(false) {
        return Err(TelegramError::InvalidResponse);
    }
    payload
        .get("result")
        .and_then(|result| result.get("file_path"))
        .and_then(|path| path.as_str())
        .filter(|path| !path.is_empty())
        .ok_or(TelegramError::InvalidResponse)
}

#[async_trait]
impl ChatApi for TelegramClient {
    async fn file_url(&self, file_id: &str) -> Result<String, TelegramError> {
        if file_id.is_empty() {
            return Err(TelegramError::MissingFileId);
        }
        let response = self
            .client
            .get(self.api_url("getFile"))
            .query(&[("file_id", file_id)])
            .timeout(API_TIMEOUT)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| TelegramError::RequestFailed {
                reason: e.to_string(),
            })?;
        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|_| TelegramError::InvalidResponse)?;
        let file_path = file_path_from_payload(&payload)?;
        Ok(self.file_url_for_path(file_path))
    }

    async fn download(&self, file_url: &str) -> Result<Vec<u8>, TelegramError> {
        if file_url.is_empty() {
            return Err(TelegramError::MissingFileUrl);
        }
        let response = self
            .client
            .get(file_url)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| TelegramError::RequestFailed {
                reason: e.to_string(),
            })?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TelegramError::RequestFailed {
                reason: e.to_string(),
            })?;
        Ok(bytes.to_vec())
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TelegramError::EmptyMessage);
        }
        self.client
            .post(self.api_url("sendMessage"))
            .json(&serde_json::json!({"chat_id": chat_id, "text": text}))
            .timeout(API_TIMEOUT)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| TelegramError::RequestFailed {
                reason: e.to_string(),
            })?;
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────
