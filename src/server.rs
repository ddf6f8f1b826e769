//! Webhook endpoint — composes authorization, de-duplication,
//! normalization, the transcription fallback, and the task lifecycle
//! into one decision flow per delivery.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use secrecy::ExposeSecret;
use serde_json::{Value, json};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth;
use crate::config::Settings;
use crate::dedupe::{DedupeCache, DedupeStatus};
use crate::error::{TaskServiceError, TranscriptionError};
use crate::normalize::{self, FORWARDED_EMPTY_PROMPT, UNSUPPORTED_MESSAGE_PROMPT, VOICE_ONLY_PROMPT};
use crate::telegram::ChatApi;
use crate::todoist::{CLEANUP_MAX_ITEMS, CreatedTask, TaskTracker};
use crate::transcribe::Transcriber;
use crate::update::{TelegramMessage, TelegramUpdate};

pub const SECRET_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

const DENIED_NOTICE: &str = "Not authorized. Please contact the administrator.";

/// Collaborators shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub dedupe: Arc<DedupeCache>,
    pub chat: Arc<dyn ChatApi>,
    pub tracker: Arc<dyn TaskTracker>,
    /// Absent when no transcription provider is configured.
    pub transcriber: Option<Arc<dyn Transcriber>>,
}

/// Build the Axum router.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhook", post(webhook))
        .with_state(state)
}

// ── Response envelope ───────────────────────────────────────────────

fn success_response(data: Value, meta: Option<Value>) -> (StatusCode, Json<Value>) {
    let mut payload = json!({"success": true, "data": data, "error": null});
    if let Some(meta) = meta {
        payload["meta"] = meta;
    }
    (StatusCode::OK, Json(payload))
}

fn error_response(
    message: &str,
    status: StatusCode,
    meta: Option<Value>,
) -> (StatusCode, Json<Value>) {
    let mut payload = json!({"success": false, "data": null, "error": message});
    if let Some(meta) = meta {
        payload["meta"] = meta;
    }
    (status, Json(payload))
}

// ── Handlers ────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    success_response(json!({"status": "ok"}), None)
}

async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<TelegramUpdate>, JsonRejection>,
) -> impl IntoResponse {
    let provided = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
    if provided != Some(state.settings.telegram_webhook_secret.expose_secret()) {
        warn!("webhook secret mismatch");
        return error_response("Unauthorized", StatusCode::UNAUTHORIZED, None);
    }

    match payload {
        Ok(Json(update)) => handle_update(&state, update).await,
        Err(rejection) => {
            warn!(error = %rejection, "webhook payload rejected");
            error_response(
                "Invalid request payload",
                StatusCode::UNPROCESSABLE_ENTITY,
                None,
            )
        }
    }
}

/// The per-delivery decision flow.
async fn handle_update(state: &AppState, update: TelegramUpdate) -> (StatusCode, Json<Value>) {
    let request_id = Uuid::new_v4().to_string();
    let meta = json!({"request_id": request_id});
    let settings = &state.settings;
    let message = update.effective_message();

    if !auth::is_authorized(
        message,
        &settings.allowed_user_ids,
        &settings.allowed_chat_ids,
    ) {
        info!(
            request_id = %request_id,
            update_id = update.update_id,
            "delivery denied by allow-list"
        );
        if settings.whitelist_reply {
            send_feedback(state, message, DENIED_NOTICE, &request_id).await;
        }
        return success_response(json!({"received": true, "authorized": false}), Some(meta));
    }

    if state.dedupe.check_and_record(update.update_id, Instant::now()) == DedupeStatus::Duplicate {
        info!(
            request_id = %request_id,
            update_id = update.update_id,
            "duplicate delivery suppressed"
        );
        return success_response(json!({"received": true, "duplicate": true}), Some(meta));
    }

    let mut transcript = None;
    if let Some(message) = message {
        if should_transcribe(message) {
            match transcribe_attachment(state, message).await {
                Ok(text) => transcript = Some(text),
                Err(err) => {
                    warn!(request_id = %request_id, error = ?err, "transcription failed");
                    send_feedback(
                        state,
                        Some(message),
                        &format!("Transcription failed: {err}"),
                        &request_id,
                    )
                    .await;
                    return success_response(
                        json!({"received": true, "normalized_text": VOICE_ONLY_PROMPT}),
                        Some(meta),
                    );
                }
            }
        }
    }

    let normalized_text = transcript.unwrap_or_else(|| normalize::normalize_update(&update));
    info!(
        request_id = %request_id,
        update_id = update.update_id,
        message_id = message.map(|m| m.message_id),
        chat_id = message.and_then(|m| m.chat.as_ref()).map(|c| c.id),
        from_id = message.and_then(|m| m.from.as_ref()).map(|u| u.id),
        "webhook received"
    );

    // Placeholder content is still task-worthy; flag it instead of dropping.
    let content = if normalized_text == UNSUPPORTED_MESSAGE_PROMPT
        || normalized_text == FORWARDED_EMPTY_PROMPT
    {
        format!("[Unsupported] {normalized_text}")
    } else {
        normalized_text.clone()
    };

    let mut description = delivery_description(update.update_id, message);
    append_attachment_urls(state, message, &mut description, &request_id).await;

    match run_task_lifecycle(state, &content, &description, &request_id).await {
        Ok(task) => {
            let feedback = match task.url.as_deref() {
                Some(url) => format!("Created task: {url}"),
                None => "Created task.".to_string(),
            };
            send_feedback(state, message, &feedback, &request_id).await;
            success_response(
                json!({"received": true, "normalized_text": normalized_text}),
                Some(meta),
            )
        }
        Err(err) => {
            warn!(request_id = %request_id, error = ?err, "task creation failed");
            send_feedback(
                state,
                message,
                &format!("Task creation failed: {err}"),
                &request_id,
            )
            .await;
            error_response(&err.to_string(), StatusCode::BAD_GATEWAY, Some(meta))
        }
    }
}

// ── Pipeline steps ──────────────────────────────────────────────────

/// Transcribe only when audio is the message's sole content; a caption
/// wins over the recording.
fn should_transcribe(message: &TelegramMessage) -> bool {
    !message.has_text_content() && message.audio_attachment().is_some()
}

async fn transcribe_attachment(
    state: &AppState,
    message: &TelegramMessage,
) -> Result<String, TranscriptionError> {
    let Some(transcriber) = state.transcriber.as_deref() else {
        return Err(TranscriptionError::NotConfigured);
    };
    let Some((file_id, mime_type)) = message.audio_attachment() else {
        return Err(TranscriptionError::EmptyAudio);
    };
    let file_url = state
        .chat
        .file_url(file_id)
        .await
        .map_err(TranscriptionError::AudioFetchFailed)?;
    let audio = state
        .chat
        .download(&file_url)
        .await
        .map_err(TranscriptionError::AudioFetchFailed)?;
    transcriber.transcribe(&audio, mime_type).await
}

/// Delivery metadata for the task description. Audit trail, never shown
/// to the sender.
fn delivery_description(update_id: i64, message: Option<&TelegramMessage>) -> String {
    fn field<T: std::fmt::Display>(value: Option<T>) -> String {
        value.map_or_else(|| "None".to_string(), |v| v.to_string())
    }

    format!(
        "meta: update_id={update_id} message_id={} chat_id={} from_id={} date={}",
        field(message.map(|m| m.message_id)),
        field(message.and_then(|m| m.chat.as_ref()).map(|c| c.id)),
        field(message.and_then(|m| m.from.as_ref()).map(|u| u.id)),
        field(message.and_then(|m| m.date)),
    )
}

/// Best-effort: append downloadable URLs for photo and document
/// attachments. Resolution failures leave the description as-is.
async fn append_attachment_urls(
    state: &AppState,
    message: Option<&TelegramMessage>,
    description: &mut String,
    request_id: &str,
) {
    let Some(message) = message else { return };

    if let Some(photo) = message.largest_photo() {
        match state.chat.file_url(&photo.file_id).await {
            Ok(url) => {
                description.push_str("\nimage_url=");
                description.push_str(&url);
            }
            Err(err) => {
                warn!(request_id = %request_id, error = ?err, "photo url resolution failed");
            }
        }
    }

    if let Some(document) = &message.document {
        match state.chat.file_url(&document.file_id).await {
            Ok(url) => {
                description.push_str("\nfile_url=");
                description.push_str(&url);
            }
            Err(err) => {
                warn!(request_id = %request_id, error = ?err, "document url resolution failed");
            }
        }
    }
}

/// Ensure parent, clean up stale children, create the child. Cleanup
/// failures are logged and swallowed; the other two abort the request.
async fn run_task_lifecycle(
    state: &AppState,
    content: &str,
    description: &str,
    request_id: &str,
) -> Result<CreatedTask, TaskServiceError> {
    let parent_id = state
        .tracker
        .ensure_parent(&state.settings.inbox_task_name)
        .await?;
    if let Err(err) = state
        .tracker
        .cleanup_stale_children(
            &parent_id,
            state.settings.cleanup_days,
            CLEANUP_MAX_ITEMS,
            Utc::now(),
        )
        .await
    {
        warn!(request_id = %request_id, error = ?err, "stale subtask cleanup failed");
    }
    state
        .tracker
        .create_child(content, &parent_id, Some(description))
        .await
}

/// Feedback is a courtesy; failures are logged, never propagated.
async fn send_feedback(
    state: &AppState,
    message: Option<&TelegramMessage>,
    text: &str,
    request_id: &str,
) {
    let Some(chat_id) = message.and_then(|m| m.chat.as_ref()).map(|c| c.id) else {
        return;
    };
    if let Err(err) = state.chat.send_message(chat_id, text).await {
        warn!(request_id = %request_id, error = ?err, "sender feedback failed");
    }
}

// ── Tests ───────────────────────────────────────────────────────────
