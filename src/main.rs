use std::sync::Arc;

use inbox_relay::config::Settings;
use inbox_relay::dedupe::DedupeCache;
use inbox_relay::server::{self, AppState};
use inbox_relay::telegram::TelegramClient;
use inbox_relay::todoist::TodoistClient;
use inbox_relay::transcribe::{GeminiTranscriber, Transcriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let settings = match Settings::from_env() {
        Ok(settings) => Arc::new(settings),
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    };

    let dedupe = Arc::new(DedupeCache::new(
        settings.dedupe_max_entries,
        settings.dedupe_ttl,
    ));
    let chat = Arc::new(TelegramClient::new(settings.telegram_bot_token.clone()));
    let tracker = Arc::new(TodoistClient::new(settings.todoist_api_token.clone()));
    let transcriber: Option<Arc<dyn Transcriber>> = if settings.transcription_configured() {
        settings.gemini_api_key.clone().map(|key| {
            Arc::new(GeminiTranscriber::new(key, settings.gemini_model.clone()))
                as Arc<dyn Transcriber>
        })
    } else {
        None
    };

    tracing::info!(
        port = settings.port,
        inbox_task = %settings.inbox_task_name,
        transcription = transcriber.is_some(),
        restricted = !settings.allowed_user_ids.is_empty() || !settings.allowed_chat_ids.is_empty(),
        "settings loaded"
    );

    let state = AppState {
        settings: Arc::clone(&settings),
        dedupe,
        chat,
        tracker,
        transcriber,
    };
    let app = server::routes(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", settings.port)).await?;
    tracing::info!(port = settings.port, "webhook server started");
    axum::serve(listener, app).await?;

    Ok(())
}
