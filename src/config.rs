//! Environment-driven settings.
//!
//! All knobs come from the process environment. `from_env` delegates to
//! `from_lookup` so tests can feed a plain map instead of mutating
//! process-global state.

use std::collections::HashSet;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

pub const DEFAULT_INBOX_TASK_NAME: &str = "Todo later";
pub const DEFAULT_CLEANUP_DAYS: i64 = 7;
pub const DEFAULT_DEDUPE_MAX_ENTRIES: usize = 1024;
pub const DEFAULT_DEDUPE_TTL_SECS: u64 = 600;
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Clone)]
pub struct Settings {
    pub telegram_bot_token: SecretString,
    pub telegram_webhook_secret: SecretString,
    pub todoist_api_token: SecretString,
    /// Content of the recurring parent task all deliveries land under.
    pub inbox_task_name: String,
    pub allowed_user_ids: HashSet<i64>,
    pub allowed_chat_ids: HashSet<i64>,
    /// Whether denied senders get a notice instead of silence.
    pub whitelist_reply: bool,
    pub transcribe_provider: Option<String>,
    pub gemini_api_key: Option<SecretString>,
    pub gemini_model: Option<String>,
    pub cleanup_days: i64,
    pub dedupe_max_entries: usize,
    pub dedupe_ttl: Duration,
    pub port: u16,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let require = |key: &str| {
            lookup(key)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
        };

        Ok(Self {
            telegram_bot_token: SecretString::from(require("TELEGRAM_BOT_TOKEN")?),
            telegram_webhook_secret: SecretString::from(require("TELEGRAM_WEBHOOK_SECRET")?),
            todoist_api_token: SecretString::from(require("TODOIST_API_TOKEN")?),
            inbox_task_name: lookup("INBOX_TASK_NAME")
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_INBOX_TASK_NAME.to_string()),
            allowed_user_ids: parse_id_list("TELEGRAM_ALLOWED_USER_IDS", &lookup)?,
            allowed_chat_ids: parse_id_list("TELEGRAM_ALLOWED_CHAT_IDS", &lookup)?,
            whitelist_reply: parse_bool("TELEGRAM_WHITELIST_REPLY", &lookup)?,
            transcribe_provider: lookup("TRANSCRIBE_PROVIDER").filter(|p| !p.is_empty()),
            gemini_api_key: lookup("GEMINI_API_KEY")
                .filter(|key| !key.is_empty())
                .map(SecretString::from),
            gemini_model: lookup("GEMINI_MODEL").filter(|model| !model.is_empty()),
            cleanup_days: parse_number("TODOIST_CLEANUP_DAYS", &lookup, DEFAULT_CLEANUP_DAYS)?,
            dedupe_max_entries: parse_number(
                "DEDUPE_MAX_ENTRIES",
                &lookup,
                DEFAULT_DEDUPE_MAX_ENTRIES,
            )?,
            dedupe_ttl: Duration::from_secs(parse_number(
                "DEDUPE_TTL_SECS",
                &lookup,
                DEFAULT_DEDUPE_TTL_SECS,
            )?),
            port: parse_number("PORT", &lookup, DEFAULT_PORT)?,
        })
    }

    /// Transcription runs only with a known provider and its credential.
    pub fn transcription_configured(&self) -> bool {
        self.transcribe_provider.as_deref() == Some("gemini") && self.gemini_api_key.is_some()
    }
}

fn parse_id_list(
    key: &str,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<HashSet<i64>, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(HashSet::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{part:?}: {e}"),
            })
        })
        .collect()
}

fn parse_bool(key: &str, lookup: &impl Fn(&str) -> Option<String>) -> Result<bool, ConfigError> {
    match lookup(key).as_deref() {
        None | Some("") => Ok(false),
        Some("true") | Some("1") | Some("yes") => Ok(true),
        Some("false") | Some("0") | Some("no") => Ok(false),
        Some(other) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got {other:?}"),
        }),
    }
}

fn parse_number<T: std::str::FromStr>(
    key: &str,
    lookup: &impl Fn(&str) -> Option<String>,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) if raw.is_empty() => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
    }
}

// ── Tests ───────────────────────────────────────────────────────────
