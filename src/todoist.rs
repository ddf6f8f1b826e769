//! Todoist task lifecycle — recurring inbox parent, stale-child cleanup,
//! subtask creation.
//!
//! Parent lookup matches on exact content; the first match wins if the
//! account somehow holds duplicates. Cleanup runs against the Sync API
//! archive because the REST endpoint does not list completed children.

use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::error::TaskServiceError;

pub const TODOIST_TASKS_URL: &str = "https://api.todoist.com/api/v1/tasks";
pub const TODOIST_SYNC_URL: &str = "https://api.todoist.com/sync/v9";
const PARENT_DUE_STRING: &str = "every day";
const TODAY_DUE_STRING: &str = "today";
pub const CLEANUP_MAX_ITEMS: usize = 50;
pub const TASK_CONTENT_MAX_CHARS: usize = 500;
const CONTENT_TRUNCATION_SUFFIX: &str = "...";
const REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(10);

/// A task created by [`TaskTracker::create_child`].
#[derive(Debug, Clone)]
pub struct CreatedTask {
    pub id: String,
    pub url: Option<String>,
}

/// Task-tracker capability.
#[async_trait]
pub trait TaskTracker: Send + Sync {
    /// Look up the recurring parent task by exact content match; reschedule
    /// it to be due today if it drifted, create it if absent. Returns the
    /// parent task id.
    async fn ensure_parent(&self, task_name: &str) -> Result<String, TaskServiceError>;

    /// Delete completed children of `parent_id` finished before
    /// `now - older_than_days`, at most `max_items` per pass. Returns the
    /// number deleted.
    async fn cleanup_stale_children(
        &self,
        parent_id: &str,
        older_than_days: i64,
        max_items: usize,
        now: DateTime<Utc>,
    ) -> Result<usize, TaskServiceError>;

    /// Create a subtask under `parent_id` with length-bounded content.
    async fn create_child(
        &self,
        content: &str,
        parent_id: &str,
        description: Option<&str>,
    ) -> Result<CreatedTask, TaskServiceError>;
}

/// REST + Sync API client.
pub struct TodoistClient {
    api_token: SecretString,
    client: reqwest::Client,
}

impl TodoistClient {
    pub fn new(api_token: SecretString) -> Self {
        Self {
            api_token,
            client: reqwest::Client::new(),
        }
    }

    async fn set_due_today(&self, task_id: &str) -> Result<(), TaskServiceError> {
        self.client
            .post(format!("{TODOIST_TASKS_URL}/{task_id}"))
            .bearer_auth(self.api_token.expose_secret())
            .json(&serde_json::json!({"due_string": TODAY_DUE_STRING}))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(request_failed)?;
        Ok(())
    }
}

fn request_failed(error: reqwest::Error) -> TaskServiceError {
    TaskServiceError::RequestFailed {
        reason: error.to_string(),
    }
}

// ── Payload helpers ─────────────────────────────────────────────────

/// Tasks arrive either as a bare array or wrapped in `{"results": [...]}`.
fn extract_tasks(payload: &Value) -> Result<Vec<&Value>, TaskServiceError> {
    if let Some(tasks) = payload.as_array() {
        return Ok(tasks.iter().filter(|task| task.is_object()).collect());
    }
    if let Some(results) = payload.get("results").and_then(|r| r.as_array()) {
        return Ok(results.iter().filter(|task| task.is_object()).collect());
    }
    Err(TaskServiceError::InvalidResponse)
}

/// Task ids arrive as strings or numbers depending on the endpoint.
fn task_id(task: &Value) -> Option<String> {
    match task.get("id")? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

fn id_string(id: &Value) -> String {
    match id {
        Value::String(id) => id.clone(),
        other => other.to_string(),
    }
}

fn is_due_today(due: Option<&Value>, today: NaiveDate) -> bool {
    let Some(due) = due else {
        return false;
    };
    if let Some(date) = due.get("date").and_then(|d| d.as_str()) {
        return NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map(|parsed| parsed == today)
            .unwrap_or(false);
    }
    if let Some(datetime) = due.get("datetime").and_then(|d| d.as_str()) {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(datetime) {
            return parsed.date_naive() == today;
        }
        return NaiveDateTime::parse_from_str(datetime, "%Y-%m-%dT%H:%M:%S")
            .map(|parsed| parsed.date() == today)
            .unwrap_or(false);
    }
    false
}

fn parse_completed_at(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let raw = value?.as_str()?;
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    // Archive items occasionally omit the offset; treat those as UTC.
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Archive item ids completed strictly before `cutoff`, capped at `max_items`.
fn select_stale_ids(items: &[Value], cutoff: DateTime<Utc>, max_items: usize) -> Vec<Value> {
    let mut stale = Vec::new();
    for item in items {
        if !item.is_object() {
            continue;
        }
        let Some(completed_at) = parse_completed_at(item.get("completed_at")) else {
            continue;
        };
        if completed_at < cutoff {
            if let Some(id) = item.get("id").filter(|id| !id.is_null()) {
                stale.push(id.clone());
            }
        }
        if stale.len() >= max_items {
            break;
        }
    }
    stale
}

/// Trim and bound content, keeping a trailing ellipsis marker when cut.
fn truncate_content(content: &str, max_chars: usize) -> String {
    let normalized = content.trim();
    if normalized.chars().count() <= max_chars {
        return normalized.to_string();
    }
    let suffix_len = CONTENT_TRUNCATION_SUFFIX.chars().count();
    if max_chars <= suffix_len {
        return normalized.chars().take(max_chars).collect();
    }
    let prefix: String = normalized.chars().take(max_chars - suffix_len).collect();
    format!("{}{}", prefix.trim_end(), CONTENT_TRUNCATION_SUFFIX)
}

fn normalize_task_content(content: &str) -> String {
    truncate_content(content, TASK_CONTENT_MAX_CHARS)
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl TaskTracker for TodoistClient {
    async fn ensure_parent(&self, task_name: &str) -> Result<String, TaskServiceError> {
        if task_name.trim().is_empty() {
            return Err(TaskServiceError::MissingTaskName);
        }

        let response = self
            .client
            .get(TODOIST_TASKS_URL)
            .bearer_auth(self.api_token.expose_secret())
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(request_failed)?;
        let payload: Value = response
            .json()
            .await
            .map_err(|_| TaskServiceError::InvalidResponse)?;

        for task in extract_tasks(&payload)? {
            if task.get("content").and_then(|c| c.as_str()) != Some(task_name) {
                continue;
            }
            if let Some(id) = task_id(task) {
                if !is_due_today(task.get("due"), Utc::now().date_naive()) {
                    self.set_due_today(&id).await?;
                }
                return Ok(id);
            }
        }

        let response = self
            .client
            .post(TODOIST_TASKS_URL)
            .bearer_auth(self.api_token.expose_secret())
            .json(&serde_json::json!({
                "content": task_name.trim(),
                "due_string": PARENT_DUE_STRING,
            }))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(request_failed)?;
        let created: Value = response
            .json()
            .await
            .map_err(|_| TaskServiceError::InvalidResponse)?;
        task_id(&created).ok_or(TaskServiceError::InvalidResponse)
    }

    async fn cleanup_stale_children(
        &self,
        parent_id: &str,
        older_than_days: i64,
        max_items: usize,
        now: DateTime<Utc>,
    ) -> Result<usize, TaskServiceError> {
        if parent_id.is_empty() {
            return Err(TaskServiceError::MissingParentId);
        }
        if older_than_days < 1 {
            return Err(TaskServiceError::CleanupWindowTooShort);
        }
        if max_items < 1 {
            return Ok(0);
        }

        let response = self
            .client
            .get(format!("{TODOIST_SYNC_URL}/archive/items"))
            .bearer_auth(self.api_token.expose_secret())
            .query(&[
                ("item_id", parent_id.to_string()),
                ("limit", max_items.to_string()),
            ])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(request_failed)?;
        let payload: Value = response
            .json()
            .await
            .map_err(|_| TaskServiceError::InvalidResponse)?;
        let items = payload
            .as_array()
            .ok_or(TaskServiceError::InvalidResponse)?;

        let cutoff = now - Duration::days(older_than_days);
        let stale = select_stale_ids(items, cutoff, max_items);
        if stale.is_empty() {
            return Ok(0);
        }

        let commands: Vec<Value> = stale
            .iter()
            .map(|id| {
                serde_json::json!({
                    "type": "item_delete",
                    "uuid": id_string(id),
                    "args": {"id": id},
                })
            })
            .collect();
        let response = self
            .client
            .post(format!("{TODOIST_SYNC_URL}/sync"))
            .bearer_auth(self.api_token.expose_secret())
            .json(&serde_json::json!({"commands": commands}))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(request_failed)?;
        response
            .json::<Value>()
            .await
            .map_err(|_| TaskServiceError::InvalidResponse)?;
        Ok(stale.len())
    }

    async fn create_child(
        &self,
        content: &str,
        parent_id: &str,
        description: Option<&str>,
    ) -> Result<CreatedTask, TaskServiceError> {
        if content.trim().is_empty() {
            return Err(TaskServiceError::EmptyContent);
        }
        if parent_id.is_empty() {
            return Err(TaskServiceError::MissingParentId);
        }

        let mut payload = serde_json::json!({
            "content": normalize_task_content(content),
            "parent_id": parent_id,
        });
        if let Some(description) = description.map(str::trim).filter(|d| !d.is_empty()) {
            payload["description"] = Value::String(description.to_string());
        }

        let response = self
            .client
            .post(TODOIST_TASKS_URL)
            .bearer_auth(self.api_token.expose_secret())
            .json(&payload)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(request_failed)?;
        let created: Value = response
            .json()
            .await
            .map_err(|_| TaskServiceError::InvalidResponse)?;

        let id = task_id(&created).ok_or(TaskServiceError::InvalidResponse)?;
        let url = created
            .get("url")
            .and_then(|url| url.as_str())
            .map(str::to_string);
        Ok(CreatedTask { id, url })
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // ── Content truncation ──────────────────────────────────────────

    #[test]
    fn short_content_is_only_trimmed() {
        assert_eq!(normalize_task_content("  buy milk  "), "buy milk");
    }

    #[test]
    fn content_at_the_bound_is_unchanged() {
        let content = "a".repeat(TASK_CONTENT_MAX_CHARS);
        assert_eq!(normalize_task_content(&content), content);
    }

    #[test]
    fn long_content_is_cut_to_the_bound_with_ellipsis() {
        let content = "a".repeat(TASK_CONTENT_MAX_CHARS + 1);
        let normalized = normalize_task_content(&content);
        assert_eq!(normalized.chars().count(), TASK_CONTENT_MAX_CHARS);
        assert!(normalized.ends_with(CONTENT_TRUNCATION_SUFFIX));
    }

    #[test]
    fn truncation_never_exceeds_the_bound() {
        let content = format!("{} tail", "word ".repeat(200));
        let normalized = normalize_task_content(&content);
        assert!(normalized.chars().count() <= TASK_CONTENT_MAX_CHARS);
        assert!(normalized.ends_with(CONTENT_TRUNCATION_SUFFIX));
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let content = "日".repeat(TASK_CONTENT_MAX_CHARS + 10);
        let normalized = normalize_task_content(&content);
        assert_eq!(normalized.chars().count(), TASK_CONTENT_MAX_CHARS);
    }

    #[test]
    fn bound_smaller_than_marker_hard_truncates() {
        assert_eq!(truncate_content("abcdef", 2), "ab");
        assert_eq!(truncate_content("abcdef", 3), "abc");
    }

    #[test]
    fn bound_just_above_marker_keeps_marker() {
        assert_eq!(truncate_content("abcdef", 4), "a...");
    }

    // ── Due-date parsing ────────────────────────────────────────────

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 6).unwrap()
    }

    #[test]
    fn due_date_matching_today_is_due() {
        let due = serde_json::json!({"date": "2026-08-06"});
        assert!(is_due_today(Some(&due), today()));
    }

    #[test]
    fn due_date_in_the_past_is_not_due() {
        let due = serde_json::json!({"date": "2026-08-05"});
        assert!(!is_due_today(Some(&due), today()));
    }

    #[test]
    fn due_datetime_with_zulu_offset_is_parsed() {
        let due = serde_json::json!({"datetime": "2026-08-06T09:00:00Z"});
        assert!(is_due_today(Some(&due), today()));
    }

    #[test]
    fn due_datetime_without_offset_is_parsed() {
        let due = serde_json::json!({"datetime": "2026-08-06T09:00:00"});
        assert!(is_due_today(Some(&due), today()));
    }

    #[test]
    fn missing_or_garbled_due_is_not_due() {
        assert!(!is_due_today(None, today()));
        let due = serde_json::json!({"date": "not-a-date"});
        assert!(!is_due_today(Some(&due), today()));
        let due = serde_json::json!({"string": "every day"});
        assert!(!is_due_today(Some(&due), today()));
    }

    // ── Completed-at parsing and stale selection ────────────────────

    #[test]
    fn completed_at_accepts_rfc3339_and_zulu() {
        let value = serde_json::json!("2026-01-20T10:00:00Z");
        assert_eq!(
            parse_completed_at(Some(&value)),
            Some(Utc.with_ymd_and_hms(2026, 1, 20, 10, 0, 0).unwrap())
        );
        let value = serde_json::json!("2026-01-20T10:00:00+02:00");
        assert_eq!(
            parse_completed_at(Some(&value)),
            Some(Utc.with_ymd_and_hms(2026, 1, 20, 8, 0, 0).unwrap())
        );
    }

    #[test]
    fn completed_at_without_offset_is_utc() {
        let value = serde_json::json!("2026-01-20T10:00:00");
        assert_eq!(
            parse_completed_at(Some(&value)),
            Some(Utc.with_ymd_and_hms(2026, 1, 20, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn completed_at_rejects_garbage() {
        assert_eq!(parse_completed_at(None), None);
        assert_eq!(parse_completed_at(Some(&serde_json::json!(42))), None);
        assert_eq!(parse_completed_at(Some(&serde_json::json!(""))), None);
        assert_eq!(parse_completed_at(Some(&serde_json::json!("soon"))), None);
    }

    #[test]
    fn selects_only_items_completed_before_the_cutoff() {
        let cutoff = Utc.with_ymd_and_hms(2026, 1, 20, 0, 0, 0).unwrap();
        let items = vec![
            serde_json::json!({"id": 1, "completed_at": "2026-01-19T23:00:00Z"}),
            serde_json::json!({"id": 2, "completed_at": "2026-01-20T01:00:00Z"}),
            serde_json::json!({"id": 3, "completed_at": "2026-01-20T00:00:00Z"}),
            serde_json::json!({"id": 4}),
        ];
        let stale = select_stale_ids(&items, cutoff, 10);
        assert_eq!(stale, vec![serde_json::json!(1)]);
    }

    #[test]
    fn selection_is_capped_at_max_items() {
        let cutoff = Utc.with_ymd_and_hms(2026, 1, 20, 0, 0, 0).unwrap();
        let items: Vec<Value> = (0..5)
            .map(|i| serde_json::json!({"id": i, "completed_at": "2026-01-01T00:00:00Z"}))
            .collect();
        assert_eq!(select_stale_ids(&items, cutoff, 3).len(), 3);
    }

    #[test]
    fn items_without_completed_at_are_skipped() {
        let cutoff = Utc.with_ymd_and_hms(2026, 1, 20, 0, 0, 0).unwrap();
        let items = vec![
            serde_json::json!({"id": 1}),
            serde_json::json!("not an object"),
        ];
        assert!(select_stale_ids(&items, cutoff, 10).is_empty());
    }

    // ── Payload helpers ─────────────────────────────────────────────

    #[test]
    fn tasks_extracted_from_bare_array() {
        let payload = serde_json::json!([{"id": "1"}, "junk", {"id": "2"}]);
        assert_eq!(extract_tasks(&payload).unwrap().len(), 2);
    }

    #[test]
    fn tasks_extracted_from_results_wrapper() {
        let payload = serde_json::json!({"results": [{"id": "1"}]});
        assert_eq!(extract_tasks(&payload).unwrap().len(), 1);
    }

    #[test]
    fn unexpected_tasks_payload_is_invalid() {
        let payload = serde_json::json!({"items": []});
        assert!(matches!(
            extract_tasks(&payload),
            Err(TaskServiceError::InvalidResponse)
        ));
    }

    #[test]
    fn task_id_accepts_string_and_number() {
        assert_eq!(task_id(&serde_json::json!({"id": "abc"})), Some("abc".into()));
        assert_eq!(task_id(&serde_json::json!({"id": 42})), Some("42".into()));
        assert_eq!(task_id(&serde_json::json!({"id": ""})), None);
        assert_eq!(task_id(&serde_json::json!({})), None);
    }

    #[test]
    fn id_string_does_not_quote_strings() {
        assert_eq!(id_string(&serde_json::json!("abc")), "abc");
        assert_eq!(id_string(&serde_json::json!(42)), "42");
    }

    // ── Input validation ────────────────────────────────────────────

    #[tokio::test]
    async fn create_child_rejects_blank_content() {
        let client = TodoistClient::new(SecretString::from("t"));
        assert!(matches!(
            client.create_child("   ", "parent-1", None).await,
            Err(TaskServiceError::EmptyContent)
        ));
    }

    #[tokio::test]
    async fn create_child_rejects_missing_parent() {
        let client = TodoistClient::new(SecretString::from("t"));
        assert!(matches!(
            client.create_child("task", "", None).await,
            Err(TaskServiceError::MissingParentId)
        ));
    }

    #[tokio::test]
    async fn ensure_parent_rejects_blank_name() {
        let client = TodoistClient::new(SecretString::from("t"));
        assert!(matches!(
            client.ensure_parent("  ").await,
            Err(TaskServiceError::MissingTaskName)
        ));
    }

    #[tokio::test]
    async fn cleanup_rejects_short_window() {
        let client = TodoistClient::new(SecretString::from("t"));
        assert!(matches!(
            client
                .cleanup_stale_children("parent-1", 0, 10, Utc::now())
                .await,
            Err(TaskServiceError::CleanupWindowTooShort)
        ));
    }

    #[tokio::test]
    async fn cleanup_with_zero_budget_deletes_nothing() {
        let client = TodoistClient::new(SecretString::from("t"));
        assert_eq!(
            client
                .cleanup_stale_children("parent-1", 7, 0, Utc::now())
                .await
                .unwrap(),
            0
        );
    }
}
