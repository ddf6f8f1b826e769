//! Error types for the relay.
//!
//! `Display` on the outbound-service enums is the user-facing message and
//! must stay free of request internals; those live in the `reason` fields
//! and only reach logs through `Debug`.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Telegram Bot API errors.
#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("Telegram file id is required")]
    MissingFileId,

    #[error("Telegram file url is required")]
    MissingFileUrl,

    #[error("Telegram message text is required")]
    EmptyMessage,

    #[error("Telegram request failed")]
    RequestFailed { reason: String },

    #[error("Telegram response invalid")]
    InvalidResponse,
}

/// Task-tracker (Todoist) errors.
#[derive(Debug, thiserror::Error)]
pub enum TaskServiceError {
    #[error("Message text is required")]
    EmptyContent,

    #[error("Todoist parent task id is required")]
    MissingParentId,

    #[error("Inbox task name is required")]
    MissingTaskName,

    #[error("Cleanup window must be at least 1 day")]
    CleanupWindowTooShort,

    #[error("Todoist request failed")]
    RequestFailed { reason: String },

    #[error("Todoist response invalid")]
    InvalidResponse,
}

/// Speech-to-text errors.
#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("Transcription is not configured")]
    NotConfigured,

    #[error("Audio payload is empty")]
    EmptyAudio,

    #[error("Audio mime type is required")]
    MissingMimeType,

    #[error("Audio download failed")]
    AudioFetchFailed(#[source] TelegramError),

    #[error("Gemini request failed")]
    RequestFailed { reason: String },

    #[error("Gemini response invalid")]
    InvalidResponse,

    #[error("Gemini response empty")]
    EmptyTranscript,
}
