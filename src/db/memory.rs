//! Memory repository for long-term memory storage

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use serde_json::Map;
use uuid::Uuid;

use super::{DbPool, format_timestamp, parse_timestamp};
use crate::{Error, Result};

/// Prefix used for memory types emitted by context source updates
const CONTEXT_UPDATE_PREFIX: &str = "context_update_";

/// Tags of records the pipeline writes about itself
const SYSTEM_TYPES: [&str; 4] = [
    "proactive_action",
    "proactive_alert",
    "context_snapshot",
    "habit_executed",
];

/// Compute cosine similarity between two vectors.
///
/// Returns a value in `[-1.0, 1.0]` where 1.0 is identical direction.
/// Returns 0.0 if either vector has zero magnitude or the lengths differ.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;

    for (ai, bi) in a.iter().zip(b.iter()) {
        let ai = f64::from(*ai);
        let bi = f64::from(*bi);
        dot += ai * bi;
        norm_a += ai * ai;
        norm_b += bi * bi;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f64::EPSILON {
        return 0.0;
    }

    #[allow(clippy::cast_possible_truncation)]
    let sim = (dot / denom) as f32;
    sim
}

/// Column list for all memory SELECT queries
const MEMORY_COLUMNS: &str =
    "id, user_id, memory_type, content, embedding, context_data, related_ids, importance, state, created_at";

/// Map a database row to a `MemoryRow`
fn row_to_memory_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemoryRow> {
    Ok(MemoryRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        memory_type: row.get(2)?,
        content: row.get(3)?,
        embedding: row.get(4)?,
        context_data: row.get(5)?,
        related_ids: row.get(6)?,
        importance: row.get(7)?,
        state: row.get(8)?,
        created_at: row.get(9)?,
    })
}

/// Kind of memory record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemoryType {
    Reminder,
    Schedule,
    Habit,
    Contact,
    ContactInteraction,
    Sms,
    Call,
    Email,
    Todo,
    Note,
    VoiceNote,
    ProactiveAction,
    ProactiveAlert,
    ContextSnapshot,
    HabitExecuted,
    /// Any other tag, including `context_update_<source>`
    Other(String),
}

impl MemoryType {
    /// Stored string tag
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Reminder => "reminder",
            Self::Schedule => "schedule",
            Self::Habit => "habit",
            Self::Contact => "contact",
            Self::ContactInteraction => "contact_interaction",
            Self::Sms => "sms",
            Self::Call => "call",
            Self::Email => "email",
            Self::Todo => "todo",
            Self::Note => "note",
            Self::VoiceNote => "voice_note",
            Self::ProactiveAction => "proactive_action",
            Self::ProactiveAlert => "proactive_alert",
            Self::ContextSnapshot => "context_snapshot",
            Self::HabitExecuted => "habit_executed",
            Self::Other(tag) => tag,
        }
    }

    /// Parse a stored tag; unknown tags become `Other`
    #[must_use]
    pub fn from_str_value(s: &str) -> Self {
        match s {
            "reminder" => Self::Reminder,
            "schedule" => Self::Schedule,
            "habit" => Self::Habit,
            "contact" => Self::Contact,
            "contact_interaction" => Self::ContactInteraction,
            "sms" => Self::Sms,
            "call" => Self::Call,
            "email" => Self::Email,
            "todo" => Self::Todo,
            "note" => Self::Note,
            "voice_note" => Self::VoiceNote,
            "proactive_action" => Self::ProactiveAction,
            "proactive_alert" => Self::ProactiveAlert,
            "context_snapshot" => Self::ContextSnapshot,
            "habit_executed" => Self::HabitExecuted,
            other => Self::Other(other.to_string()),
        }
    }

    /// Memory type recorded when a context source pushes an update
    #[must_use]
    pub fn context_update(source: &str) -> Self {
        Self::Other(format!("{CONTEXT_UPDATE_PREFIX}{source}"))
    }

    /// Source name if this is a context update
    #[must_use]
    pub fn context_update_source(&self) -> Option<&str> {
        match self {
            Self::Other(tag) => tag.strip_prefix(CONTEXT_UPDATE_PREFIX),
            _ => None,
        }
    }

    /// Written by the pipeline itself rather than from user activity
    #[must_use]
    pub fn is_system(&self) -> bool {
        SYSTEM_TYPES.contains(&self.as_str()) || self.context_update_source().is_some()
    }

    /// Whether storing this type schedules a follow-up reminder
    #[must_use]
    pub const fn schedules_reminder(&self) -> bool {
        matches!(self, Self::Reminder | Self::Todo | Self::Note | Self::VoiceNote)
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for MemoryType {
    fn from(s: &str) -> Self {
        Self::from_str_value(s)
    }
}

/// Lifecycle state of a memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryState {
    /// Visible to recall
    Active,
    /// Soft-deleted; retained but never recalled
    Forgotten,
}

impl MemoryState {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Forgotten => "forgotten",
        }
    }

    fn from_str_value(s: &str) -> Self {
        match s {
            "forgotten" => Self::Forgotten,
            _ => Self::Active,
        }
    }
}

/// A memory item stored in the database
#[derive(Debug, Clone)]
pub struct Memory {
    pub id: String,
    pub user_id: String,
    pub memory_type: MemoryType,
    pub content: String,
    /// Optional embedding for semantic recall
    pub embedding: Option<Vec<f32>>,
    /// Free-form context (confidence, entities, contact name, ...)
    pub context_data: Map<String, serde_json::Value>,
    pub related_ids: Vec<String>,
    /// Salience in `[0.0, 1.0]`
    pub importance: f64,
    pub state: MemoryState,
    pub created_at: DateTime<Utc>,
}

impl Memory {
    /// Create a new active memory item
    #[must_use]
    pub fn new(user_id: impl Into<String>, memory_type: MemoryType, content: impl Into<String>) -> Self {
        Self {
            id: format!("mem_{}", Uuid::now_v7()),
            user_id: user_id.into(),
            memory_type,
            content: content.into(),
            embedding: None,
            context_data: Map::new(),
            related_ids: Vec::new(),
            importance: 0.5,
            state: MemoryState::Active,
            created_at: Utc::now(),
        }
    }

    /// Set the importance, clamped to `[0.0, 1.0]`
    #[must_use]
    pub fn with_importance(mut self, importance: f64) -> Self {
        self.importance = importance.clamp(0.0, 1.0);
        self
    }

    /// Attach context data
    #[must_use]
    pub fn with_context(mut self, context_data: Map<String, serde_json::Value>) -> Self {
        self.context_data = context_data;
        self
    }

    /// Record related memory ids
    #[must_use]
    pub fn with_related(mut self, related_ids: Vec<String>) -> Self {
        self.related_ids = related_ids;
        self
    }

    /// Set the embedding for this memory
    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Override the creation time (imports and replayed history)
    #[must_use]
    pub const fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Whether this memory is visible to recall
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.state, MemoryState::Active)
    }

    /// String value from context data
    #[must_use]
    pub fn context_str(&self, key: &str) -> Option<&str> {
        self.context_data.get(key).and_then(serde_json::Value::as_str)
    }
}

/// Filter for structured recall
#[derive(Debug, Clone)]
pub struct MemoryFilter {
    pub memory_type: Option<MemoryType>,
    /// Only memories created at or after this time
    pub since: Option<DateTime<Utc>>,
    pub min_importance: f64,
    pub limit: usize,
}

impl Default for MemoryFilter {
    fn default() -> Self {
        Self {
            memory_type: None,
            since: None,
            min_importance: 0.0,
            limit: 10,
        }
    }
}

/// Per-type aggregate used by memory summaries
#[derive(Debug, Clone, PartialEq)]
pub struct TypeStats {
    pub memory_type: MemoryType,
    pub count: usize,
    pub avg_importance: f64,
}

/// Memory repository for database operations
#[derive(Debug, Clone)]
pub struct MemoryRepo {
    pool: DbPool,
}

impl MemoryRepo {
    /// Create a new memory repository
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Add a new memory
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn add(&self, memory: &Memory) -> Result<()> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        let context_json = serde_json::to_string(&memory.context_data)?;
        let related_json = serde_json::to_string(&memory.related_ids)?;

        let embedding_bytes = memory
            .embedding
            .as_ref()
            .map(|e| super::embedder::Embedder::to_bytes(e));

        conn.execute(
            &format!(
                "INSERT INTO memories ({MEMORY_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
            ),
            rusqlite::params![
                memory.id,
                memory.user_id,
                memory.memory_type.as_str(),
                memory.content,
                embedding_bytes,
                context_json,
                related_json,
                memory.importance,
                memory.state.as_str(),
                format_timestamp(&memory.created_at),
            ],
        )?;

        Ok(())
    }

    /// Get a memory by ID regardless of state
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get(&self, user_id: &str, id: &str) -> Result<Option<Memory>> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        let result = conn.query_row(
            &format!("SELECT {MEMORY_COLUMNS} FROM memories WHERE id = ?1 AND user_id = ?2"),
            [id, user_id],
            row_to_memory_row,
        );

        match result {
            Ok(row) => Ok(Some(row.into_memory())),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Active memories matching a filter, most important then newest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list(&self, user_id: &str, filter: &MemoryFilter) -> Result<Vec<Memory>> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        let mut sql = format!(
            "SELECT {MEMORY_COLUMNS} FROM memories WHERE user_id = ?1 AND state = 'active' AND importance >= ?2"
        );
        let mut params = vec![
            Value::Text(user_id.to_string()),
            Value::Real(filter.min_importance),
        ];

        if let Some(memory_type) = &filter.memory_type {
            params.push(Value::Text(memory_type.to_string()));
            let _ = write!(sql, " AND memory_type = ?{}", params.len());
        }
        if let Some(since) = &filter.since {
            params.push(Value::Text(format_timestamp(since)));
            let _ = write!(sql, " AND created_at >= ?{}", params.len());
        }

        #[allow(clippy::cast_possible_wrap)]
        params.push(Value::Integer(filter.limit as i64));
        let _ = write!(
            sql,
            " ORDER BY importance DESC, created_at DESC LIMIT ?{}",
            params.len()
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(params), row_to_memory_row)?;

        Ok(rows.flatten().map(MemoryRow::into_memory).collect())
    }

    /// Candidate pool for semantic recall: active, embedded, newest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn embedded_candidates(
        &self,
        user_id: &str,
        min_importance: f64,
        pool_size: usize,
    ) -> Result<Vec<Memory>> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {MEMORY_COLUMNS} FROM memories
             WHERE user_id = ?1 AND state = 'active' AND embedding IS NOT NULL AND importance >= ?2
             ORDER BY created_at DESC LIMIT ?3"
        ))?;

        #[allow(clippy::cast_possible_wrap)]
        let limit = pool_size as i64;
        let rows = stmt.query_map(
            rusqlite::params![user_id, min_importance, limit],
            row_to_memory_row,
        )?;

        Ok(rows.flatten().map(MemoryRow::into_memory).collect())
    }

    /// Active user memories since a point in time, oldest first
    ///
    /// System records (see [`MemoryType::is_system`]) are left out. Keeps the
    /// newest `limit` records when the window holds more.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn window(&self, user_id: &str, since: &DateTime<Utc>, limit: usize) -> Result<Vec<Memory>> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {MEMORY_COLUMNS} FROM memories
             WHERE user_id = ?1 AND state = 'active' AND created_at >= ?2
               AND memory_type NOT IN (?4, ?5, ?6, ?7) AND memory_type NOT LIKE ?8
             ORDER BY created_at DESC LIMIT ?3"
        ))?;

        #[allow(clippy::cast_possible_wrap)]
        let limit = limit as i64;
        let [action, alert, snapshot, executed] = SYSTEM_TYPES;
        let rows = stmt.query_map(
            rusqlite::params![
                user_id,
                format_timestamp(since),
                limit,
                action,
                alert,
                snapshot,
                executed,
                format!("{CONTEXT_UPDATE_PREFIX}%")
            ],
            row_to_memory_row,
        )?;

        let mut memories: Vec<Memory> = rows.flatten().map(MemoryRow::into_memory).collect();
        memories.reverse();
        Ok(memories)
    }

    /// Atomically raise a memory's importance, capped at 1.0
    ///
    /// Returns false if the memory does not exist or is forgotten.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn reinforce(&self, id: &str, delta: f64) -> Result<bool> {
        if delta <= 0.0 {
            return Ok(false);
        }

        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        let changed = conn.execute(
            "UPDATE memories SET importance = MIN(1.0, importance + ?1) WHERE id = ?2 AND state = 'active'",
            rusqlite::params![delta, id],
        )?;

        Ok(changed > 0)
    }

    /// Soft-delete a memory
    ///
    /// Returns false if the memory was not active.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn forget(&self, user_id: &str, id: &str) -> Result<bool> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        let changed = conn.execute(
            "UPDATE memories SET state = ?1 WHERE id = ?2 AND user_id = ?3 AND state = 'active'",
            rusqlite::params![MemoryState::Forgotten.as_str(), id, user_id],
        )?;

        Ok(changed > 0)
    }

    /// Count and average importance per type since a point in time
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn type_stats(&self, user_id: &str, since: &DateTime<Utc>) -> Result<Vec<TypeStats>> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn.prepare(
            "SELECT memory_type, COUNT(*), AVG(importance) FROM memories
             WHERE user_id = ?1 AND state = 'active' AND created_at >= ?2
             GROUP BY memory_type ORDER BY COUNT(*) DESC",
        )?;

        let rows = stmt.query_map(rusqlite::params![user_id, format_timestamp(since)], |row| {
            let memory_type: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            let avg_importance: f64 = row.get(2)?;
            Ok(TypeStats {
                memory_type: MemoryType::from_str_value(&memory_type),
                count: usize::try_from(count).unwrap_or(0),
                avg_importance,
            })
        })?;

        Ok(rows.flatten().collect())
    }

    /// Context update memories since a point in time, newest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn context_updates_since(&self, user_id: &str, since: &DateTime<Utc>) -> Result<Vec<Memory>> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {MEMORY_COLUMNS} FROM memories
             WHERE user_id = ?1 AND state = 'active' AND created_at >= ?2 AND memory_type LIKE ?3
             ORDER BY created_at DESC"
        ))?;

        let pattern = format!("{CONTEXT_UPDATE_PREFIX}%");
        let rows = stmt.query_map(
            rusqlite::params![user_id, format_timestamp(since), pattern],
            row_to_memory_row,
        )?;

        Ok(rows.flatten().map(MemoryRow::into_memory).collect())
    }
}

/// Internal row representation for memory queries
struct MemoryRow {
    id: String,
    user_id: String,
    memory_type: String,
    content: String,
    embedding: Option<Vec<u8>>,
    context_data: String,
    related_ids: String,
    importance: f64,
    state: String,
    created_at: String,
}

impl MemoryRow {
    fn into_memory(self) -> Memory {
        Memory {
            id: self.id,
            user_id: self.user_id,
            memory_type: MemoryType::from_str_value(&self.memory_type),
            content: self.content,
            embedding: self
                .embedding
                .map(|b| super::embedder::Embedder::from_bytes(&b)),
            context_data: serde_json::from_str(&self.context_data).unwrap_or_default(),
            related_ids: serde_json::from_str(&self.related_ids).unwrap_or_default(),
            importance: self.importance,
            state: MemoryState::from_str_value(&self.state),
            created_at: parse_timestamp(&self.created_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn test_memory_crud() {
        let pool = db::init_memory().unwrap();
        let repo = MemoryRepo::new(pool);

        let memory = Memory::new("u1", MemoryType::Note, "Buy oat milk").with_importance(0.7);
        repo.add(&memory).unwrap();

        let loaded = repo.get("u1", &memory.id).unwrap().unwrap();
        assert_eq!(loaded.content, "Buy oat milk");
        assert_eq!(loaded.memory_type, MemoryType::Note);
        assert!((loaded.importance - 0.7).abs() < f64::EPSILON);
        assert!(loaded.is_active());

        // Other users cannot see it
        assert!(repo.get("u2", &memory.id).unwrap().is_none());
    }

    #[test]
    fn list_orders_by_importance_then_recency() {
        let pool = db::init_memory().unwrap();
        let repo = MemoryRepo::new(pool);
        let now = Utc::now();

        let low = Memory::new("u1", MemoryType::Sms, "low").with_importance(0.2);
        let high_old = Memory::new("u1", MemoryType::Sms, "high old")
            .with_importance(0.9)
            .with_created_at(now - chrono::Duration::hours(2));
        let high_new = Memory::new("u1", MemoryType::Sms, "high new").with_importance(0.9);
        for m in [&low, &high_old, &high_new] {
            repo.add(m).unwrap();
        }

        let results = repo.list("u1", &MemoryFilter::default()).unwrap();
        let contents: Vec<&str> = results.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["high new", "high old", "low"]);
    }

    #[test]
    fn list_applies_type_time_and_importance_filters() {
        let pool = db::init_memory().unwrap();
        let repo = MemoryRepo::new(pool);
        let now = Utc::now();

        repo.add(&Memory::new("u1", MemoryType::Email, "inbox")).unwrap();
        repo.add(&Memory::new("u1", MemoryType::Sms, "hello")).unwrap();
        repo.add(
            &Memory::new("u1", MemoryType::Sms, "ancient").with_created_at(now - chrono::Duration::days(3)),
        )
        .unwrap();
        repo.add(&Memory::new("u1", MemoryType::Sms, "trivial").with_importance(0.1))
            .unwrap();

        let filter = MemoryFilter {
            memory_type: Some(MemoryType::Sms),
            since: Some(now - chrono::Duration::hours(24)),
            min_importance: 0.3,
            limit: 10,
        };
        let results = repo.list("u1", &filter).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "hello");
    }

    #[test]
    fn reinforce_caps_at_one() {
        let pool = db::init_memory().unwrap();
        let repo = MemoryRepo::new(pool);

        let memory = Memory::new("u1", MemoryType::Note, "x").with_importance(0.95);
        repo.add(&memory).unwrap();

        assert!(repo.reinforce(&memory.id, 0.1).unwrap());
        let loaded = repo.get("u1", &memory.id).unwrap().unwrap();
        assert!((loaded.importance - 1.0).abs() < f64::EPSILON);

        assert!(!repo.reinforce("mem_missing", 0.1).unwrap());
    }

    #[test]
    fn forget_is_soft_and_single_shot() {
        let pool = db::init_memory().unwrap();
        let repo = MemoryRepo::new(pool);

        let memory = Memory::new("u1", MemoryType::Note, "secret");
        repo.add(&memory).unwrap();

        assert!(repo.forget("u1", &memory.id).unwrap());
        assert!(!repo.forget("u1", &memory.id).unwrap());

        let loaded = repo.get("u1", &memory.id).unwrap().unwrap();
        assert_eq!(loaded.state, MemoryState::Forgotten);
        assert!(repo.list("u1", &MemoryFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn window_is_chronological_and_keeps_newest() {
        let pool = db::init_memory().unwrap();
        let repo = MemoryRepo::new(pool);
        let now = Utc::now();

        for hours in [5, 4, 3, 2, 1] {
            repo.add(
                &Memory::new("u1", MemoryType::Sms, format!("{hours}h ago"))
                    .with_created_at(now - chrono::Duration::hours(hours)),
            )
            .unwrap();
        }

        let window = repo.window("u1", &(now - chrono::Duration::days(1)), 3).unwrap();
        let contents: Vec<&str> = window.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["3h ago", "2h ago", "1h ago"]);
    }

    #[test]
    fn window_leaves_out_system_records() {
        let pool = db::init_memory().unwrap();
        let repo = MemoryRepo::new(pool);
        let now = Utc::now();

        let system = [
            MemoryType::ContextSnapshot,
            MemoryType::ProactiveAction,
            MemoryType::ProactiveAlert,
            MemoryType::HabitExecuted,
            MemoryType::context_update("email"),
        ];
        for (i, memory_type) in system.into_iter().enumerate() {
            assert!(memory_type.is_system());
            let minutes = i64::try_from(i).unwrap() * 5 + 10;
            repo.add(
                &Memory::new("u1", memory_type, "bookkeeping")
                    .with_created_at(now - chrono::Duration::minutes(minutes)),
            )
            .unwrap();
        }
        repo.add(&Memory::new("u1", MemoryType::Sms, "hi mom")).unwrap();
        assert!(!MemoryType::Sms.is_system());

        let window = repo.window("u1", &(now - chrono::Duration::days(1)), 2).unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].content, "hi mom");
    }

    #[test]
    fn embedded_candidates_skip_unembedded() {
        let pool = db::init_memory().unwrap();
        let repo = MemoryRepo::new(pool);

        repo.add(&Memory::new("u1", MemoryType::Note, "plain")).unwrap();
        repo.add(&Memory::new("u1", MemoryType::Note, "vector").with_embedding(vec![1.0, 0.0]))
            .unwrap();

        let candidates = repo.embedded_candidates("u1", 0.0, 100).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].embedding.as_deref(), Some(&[1.0_f32, 0.0][..]));
    }

    #[test]
    fn type_stats_group_by_type() {
        let pool = db::init_memory().unwrap();
        let repo = MemoryRepo::new(pool);

        repo.add(&Memory::new("u1", MemoryType::Sms, "a").with_importance(0.4)).unwrap();
        repo.add(&Memory::new("u1", MemoryType::Sms, "b").with_importance(0.6)).unwrap();
        repo.add(&Memory::new("u1", MemoryType::Call, "c")).unwrap();

        let stats = repo
            .type_stats("u1", &(Utc::now() - chrono::Duration::days(1)))
            .unwrap();
        assert_eq!(stats[0].memory_type, MemoryType::Sms);
        assert_eq!(stats[0].count, 2);
        assert!((stats[0].avg_importance - 0.5).abs() < 1e-9);
    }

    #[test]
    fn memory_type_roundtrips_unknown_tags() {
        assert_eq!(MemoryType::from_str_value("voice_note"), MemoryType::VoiceNote);
        let update = MemoryType::context_update("email");
        assert_eq!(update.as_str(), "context_update_email");
        assert_eq!(
            MemoryType::from_str_value(update.as_str()).context_update_source(),
            Some("email")
        );
        assert!(MemoryType::Todo.schedules_reminder());
        assert!(!MemoryType::Sms.schedules_reminder());
    }

    #[test]
    fn cosine_similarity_identical_is_one() {
        let v = vec![1.0_f32, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 0.001, "identical vectors should have sim ~1.0, got {sim}");
    }

    #[test]
    fn cosine_similarity_orthogonal_is_zero() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]);
        assert!(sim.abs() < 0.001, "orthogonal vectors should have sim ~0.0, got {sim}");
    }

    #[test]
    fn cosine_similarity_mismatched_lengths_is_zero() {
        assert!(cosine_similarity(&[1.0, 0.0], &[1.0]).abs() < f32::EPSILON);
        assert!(cosine_similarity(&[], &[]).abs() < f32::EPSILON);
    }
}
