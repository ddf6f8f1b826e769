//! Delivery de-duplication.
//!
//! Telegram retries webhook deliveries it considers unacknowledged; the
//! cache suppresses re-processing of an `update_id` seen within the
//! retention window. In-memory only — a restart forgets everything,
//! which is acceptable for a best-effort gate.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupeStatus {
    FirstSeen,
    Duplicate,
}

/// Capacity- and age-bounded set of recently seen update ids.
#[derive(Debug)]
pub struct DedupeCache {
    max_entries: usize,
    retention: Duration,
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    seen: HashMap<i64, Instant>,
    // Insertion order, oldest first; drives both expiry and eviction.
    order: VecDeque<i64>,
}

impl DedupeCache {
    pub fn new(max_entries: usize, retention: Duration) -> Self {
        Self {
            max_entries,
            retention,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Report whether `update_id` was already seen within the retention
    /// window, recording it if not. Single atomic check-and-record so two
    /// concurrent deliveries of the same id cannot both pass.
    pub fn check_and_record(&self, update_id: i64, now: Instant) -> DedupeStatus {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        while let Some(&oldest) = inner.order.front() {
            match inner.seen.get(&oldest) {
                Some(&seen_at) if now.duration_since(seen_at) >= self.retention => {
                    inner.order.pop_front();
                    inner.seen.remove(&oldest);
                }
                _ => break,
            }
        }

        if inner.seen.contains_key(&update_id) {
            return DedupeStatus::Duplicate;
        }

        inner.seen.insert(update_id, now);
        inner.order.push_back(update_id);
        while inner.order.len() > self.max_entries {
            if let Some(evicted) = inner.order.pop_front() {
                inner.seen.remove(&evicted);
            }
        }
        DedupeStatus::FirstSeen
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .seen
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Tests ───────────────────────────────────────────────────────────
