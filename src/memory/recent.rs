//! Per-user recent-context buffer
//!
//! Cheap lookups of what a user stored lately without touching the database.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use lru::LruCache;
use tokio::sync::Mutex;

use crate::db::{Memory, MemoryType};

/// Users tracked before the least recently active one is dropped
const DEFAULT_MAX_USERS: usize = 10_000;

/// Trimmed view of a stored memory
#[derive(Debug, Clone, PartialEq)]
pub struct RecentEntry {
    pub memory_id: String,
    pub memory_type: MemoryType,
    /// Content truncated to the configured summary length
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

impl RecentEntry {
    /// Build an entry from a memory, truncating its content
    #[must_use]
    pub fn from_memory(memory: &Memory, summary_chars: usize) -> Self {
        Self {
            memory_id: memory.id.clone(),
            memory_type: memory.memory_type.clone(),
            summary: truncate_chars(&memory.content, summary_chars),
            created_at: memory.created_at,
        }
    }
}

struct Slot {
    entry: RecentEntry,
    inserted: Instant,
}

/// Bounded, time-expiring buffer of recent memories per user
pub struct RecentContext {
    users: Mutex<LruCache<String, VecDeque<Slot>>>,
    max_entries: usize,
    ttl: Duration,
}

impl RecentContext {
    /// Create a buffer holding up to `max_entries` per user for `ttl`
    #[must_use]
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(DEFAULT_MAX_USERS).unwrap_or(NonZeroUsize::MIN);
        Self {
            users: Mutex::new(LruCache::new(capacity)),
            max_entries: max_entries.max(1),
            ttl,
        }
    }

    /// Push an entry to the front of a user's buffer
    pub async fn push(&self, user_id: &str, entry: RecentEntry) {
        let mut users = self.users.lock().await;
        let ttl = self.ttl;

        let buffer = users.get_or_insert_mut(user_id.to_string(), VecDeque::new);
        buffer.retain(|slot| slot.inserted.elapsed() < ttl);
        buffer.push_front(Slot {
            entry,
            inserted: Instant::now(),
        });
        buffer.truncate(self.max_entries);
    }

    /// Newest unexpired entries for a user
    pub async fn recent(&self, user_id: &str, limit: usize) -> Vec<RecentEntry> {
        let mut users = self.users.lock().await;
        let Some(buffer) = users.get_mut(user_id) else {
            return Vec::new();
        };

        buffer.retain(|slot| slot.inserted.elapsed() < self.ttl);
        buffer
            .iter()
            .take(limit)
            .map(|slot| slot.entry.clone())
            .collect()
    }

    /// Drop a memory from a user's buffer; returns true if it was present
    pub async fn evict(&self, user_id: &str, memory_id: &str) -> bool {
        let mut users = self.users.lock().await;
        let Some(buffer) = users.get_mut(user_id) else {
            return false;
        };

        let before = buffer.len();
        buffer.retain(|slot| slot.entry.memory_id != memory_id);
        buffer.len() != before
    }
}

impl std::fmt::Debug for RecentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecentContext")
            .field("max_entries", &self.max_entries)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

/// Truncate to at most `max` characters on a char boundary
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, content: &str) -> RecentEntry {
        let memory = Memory::new("u1", MemoryType::Note, content);
        RecentEntry {
            memory_id: id.to_string(),
            ..RecentEntry::from_memory(&memory, 200)
        }
    }

    #[tokio::test]
    async fn newest_first_and_bounded() {
        let recent = RecentContext::new(3, Duration::from_secs(60));
        for i in 0..5 {
            recent.push("u1", entry(&format!("m{i}"), "note")).await;
        }

        let ids: Vec<String> = recent
            .recent("u1", 10)
            .await
            .into_iter()
            .map(|e| e.memory_id)
            .collect();
        assert_eq!(ids, vec!["m4", "m3", "m2"]);
        assert!(recent.recent("u2", 10).await.is_empty());
    }

    #[tokio::test]
    async fn expired_entries_are_hidden() {
        let recent = RecentContext::new(10, Duration::ZERO);
        recent.push("u1", entry("m1", "note")).await;
        assert!(recent.recent("u1", 10).await.is_empty());
    }

    #[tokio::test]
    async fn evict_removes_single_entry() {
        let recent = RecentContext::new(10, Duration::from_secs(60));
        recent.push("u1", entry("m1", "a")).await;
        recent.push("u1", entry("m2", "b")).await;

        assert!(recent.evict("u1", "m1").await);
        assert!(!recent.evict("u1", "m1").await);
        assert_eq!(recent.recent("u1", 10).await.len(), 1);
    }

    #[test]
    fn summary_truncates_on_char_boundary() {
        assert_eq!(truncate_chars("héllo wörld", 4), "héll");
        assert_eq!(truncate_chars("short", 200), "short");
    }
}
