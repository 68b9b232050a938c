//! Memory store: typed per-user records with semantic recall
//!
//! Wraps the memory, relationship and task repositories with embedding,
//! relationship reinforcement, reminder scheduling and the recent-context
//! buffer.

mod recent;
mod urgency;

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::{Map, Value};

pub use recent::{RecentContext, RecentEntry};
pub(crate) use recent::truncate_chars;
pub use urgency::{Urgency, analyze_urgency, reminder_delay, reminder_message};

use crate::Result;
use crate::config::MemoryConfig;
use crate::db::memory::{MemoryFilter, TypeStats, cosine_similarity};
use crate::db::relationship::RELATED_TO;
use crate::db::{
    DbPool, Embed, Memory, MemoryRepo, MemoryType, ProactiveTask, Relationship,
    RelationshipRepo, TaskKind, TaskRepo,
};

/// Strength of a `related_to` edge
const RELATED_STRENGTH: f64 = 0.8;

/// Importance added to a memory each time a new memory references it
const REFERENCE_BOOST: f64 = 0.1;

/// Importance a new memory gains per edge it creates
const PER_EDGE_BOOST: f64 = 0.1;

/// Cap on the importance a new memory gains from its own edges
const MAX_EDGE_BOOST: f64 = 0.3;

/// Number of memories listed in a summary
const SUMMARY_TOP: usize = 10;

/// A memory to be stored
#[derive(Debug, Clone)]
pub struct NewMemory {
    pub user_id: String,
    pub memory_type: MemoryType,
    pub content: String,
    pub context_data: Map<String, Value>,
    pub importance: f64,
    pub related_ids: Vec<String>,
    /// Persist a follow-up reminder for reminder-like types
    pub schedule_reminder: bool,
}

impl NewMemory {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        memory_type: MemoryType,
        content: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            memory_type,
            content: content.into(),
            context_data: Map::new(),
            importance: 0.5,
            related_ids: Vec::new(),
            schedule_reminder: true,
        }
    }

    #[must_use]
    pub fn with_importance(mut self, importance: f64) -> Self {
        self.importance = importance;
        self
    }

    #[must_use]
    pub fn with_context(mut self, context_data: Map<String, Value>) -> Self {
        self.context_data = context_data;
        self
    }

    #[must_use]
    pub fn related_to(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.related_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub const fn without_reminder(mut self) -> Self {
        self.schedule_reminder = false;
        self
    }
}

/// Recall parameters
#[derive(Debug, Clone)]
pub struct RecallQuery {
    /// Free-text query; enables semantic recall when an embedder is set
    pub query: Option<String>,
    pub memory_type: Option<MemoryType>,
    pub limit: usize,
    /// Structured recall window; zero disables the time filter
    pub hours_back: u32,
    pub min_importance: f64,
}

impl Default for RecallQuery {
    fn default() -> Self {
        Self {
            query: None,
            memory_type: None,
            limit: 10,
            hours_back: 24,
            min_importance: 0.0,
        }
    }
}

impl RecallQuery {
    /// Semantic query with default filters
    #[must_use]
    pub fn semantic(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::default()
        }
    }

    /// Structured query for one memory type
    #[must_use]
    pub fn of_type(memory_type: MemoryType, hours_back: u32, limit: usize) -> Self {
        Self {
            memory_type: Some(memory_type),
            hours_back,
            limit,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// A memory reached through the relationship graph
#[derive(Debug, Clone)]
pub struct RelatedMemory {
    pub memory: Memory,
    pub relationship_type: String,
    pub strength: f64,
}

/// Aggregate view of a user's memories over a period
#[derive(Debug, Clone)]
pub struct MemorySummary {
    pub period_days: u32,
    pub total_memories: usize,
    pub by_type: Vec<TypeStats>,
    pub top_memories: Vec<Memory>,
    pub relationship_count: usize,
}

/// Memory service
#[derive(Clone)]
pub struct MemoryStore {
    memories: MemoryRepo,
    relationships: RelationshipRepo,
    tasks: TaskRepo,
    embedder: Option<Arc<dyn Embed>>,
    recent: Arc<RecentContext>,
    config: MemoryConfig,
}

impl MemoryStore {
    /// Create a store without an embedding backend
    #[must_use]
    pub fn new(pool: DbPool, config: MemoryConfig) -> Self {
        let recent = RecentContext::new(config.recent_max_entries, config.recent_ttl);
        Self {
            memories: MemoryRepo::new(pool.clone()),
            relationships: RelationshipRepo::new(pool.clone()),
            tasks: TaskRepo::new(pool),
            embedder: None,
            recent: Arc::new(recent),
            config,
        }
    }

    /// Attach an embedding backend for semantic recall
    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<dyn Embed>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    #[must_use]
    pub const fn has_embedder(&self) -> bool {
        self.embedder.is_some()
    }

    /// Store a memory and return its id
    ///
    /// Embedding failures are logged and the memory is stored without a
    /// vector. Related ids that do not name an active memory of the same
    /// user are ignored.
    ///
    /// # Errors
    ///
    /// Returns error if the memory cannot be persisted
    pub async fn store(&self, request: NewMemory) -> Result<String> {
        let NewMemory {
            user_id,
            memory_type,
            content,
            context_data,
            importance,
            related_ids,
            schedule_reminder,
        } = request;

        let embedding = self.embed_soft(&content).await;

        let related = self.existing_related(&user_id, related_ids)?;
        let mut memory = Memory::new(&user_id, memory_type, content)
            .with_importance(importance)
            .with_context(context_data)
            .with_related(related.clone());
        if let Some(embedding) = embedding {
            memory = memory.with_embedding(embedding);
        }

        self.memories.add(&memory)?;
        tracing::debug!(
            user_id = %user_id,
            memory_id = %memory.id,
            memory_type = %memory.memory_type,
            "stored memory"
        );

        self.link_related(&memory, &related)?;

        self.recent
            .push(
                &user_id,
                RecentEntry::from_memory(&memory, self.config.summary_chars),
            )
            .await;

        if schedule_reminder && memory.memory_type.schedules_reminder() {
            self.schedule_reminder(&memory);
        }

        Ok(memory.id)
    }

    /// Recall memories, semantically when possible
    ///
    /// Falls back to structured recall when no embedder is configured or the
    /// query cannot be embedded.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub async fn recall(&self, user_id: &str, query: &RecallQuery) -> Result<Vec<Memory>> {
        if let Some(text) = query.query.as_deref() {
            if let Some(vector) = self.embed_soft(text).await {
                return self.semantic_recall(user_id, &vector, query);
            }
        }

        self.structured_recall(user_id, query)
    }

    fn structured_recall(&self, user_id: &str, query: &RecallQuery) -> Result<Vec<Memory>> {
        let since = (query.hours_back > 0)
            .then(|| Utc::now() - Duration::hours(i64::from(query.hours_back)));

        self.memories.list(
            user_id,
            &MemoryFilter {
                memory_type: query.memory_type.clone(),
                since,
                min_importance: query.min_importance,
                limit: query.limit,
            },
        )
    }

    fn semantic_recall(
        &self,
        user_id: &str,
        vector: &[f32],
        query: &RecallQuery,
    ) -> Result<Vec<Memory>> {
        let candidates = self.memories.embedded_candidates(
            user_id,
            query.min_importance,
            self.config.semantic_pool,
        )?;

        let mut scored: Vec<(f32, Memory)> = candidates
            .into_iter()
            .filter(|m| {
                query
                    .memory_type
                    .as_ref()
                    .is_none_or(|t| &m.memory_type == t)
            })
            .filter_map(|m| {
                let score = cosine_similarity(vector, m.embedding.as_deref()?);
                Some((score, m))
            })
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        Ok(scored
            .into_iter()
            .take(query.limit)
            .map(|(_, m)| m)
            .collect())
    }

    /// Soft-delete a memory
    ///
    /// Returns false if the memory does not exist or was already forgotten.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub async fn forget(&self, user_id: &str, memory_id: &str) -> Result<bool> {
        let forgotten = self.memories.forget(user_id, memory_id)?;
        self.recent.evict(user_id, memory_id).await;

        if forgotten {
            tracing::debug!(user_id = %user_id, memory_id = %memory_id, "forgot memory");
        }
        Ok(forgotten)
    }

    /// Get a single active memory
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get(&self, user_id: &str, memory_id: &str) -> Result<Option<Memory>> {
        Ok(self
            .memories
            .get(user_id, memory_id)?
            .filter(Memory::is_active))
    }

    /// Active memories linked to `memory_id`, strongest edge first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get_related(
        &self,
        user_id: &str,
        memory_id: &str,
        limit: usize,
    ) -> Result<Vec<RelatedMemory>> {
        let edges = self.relationships.edges_for(user_id, memory_id, limit)?;

        let mut related = Vec::with_capacity(edges.len());
        for edge in edges {
            if let Some(memory) = self.get(user_id, edge.other_end(memory_id))? {
                related.push(RelatedMemory {
                    memory,
                    relationship_type: edge.relationship_type,
                    strength: edge.strength,
                });
            }
        }
        Ok(related)
    }

    /// Summarize the last `days` days of memories
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get_summary(&self, user_id: &str, days: u32) -> Result<MemorySummary> {
        let since = Utc::now() - Duration::days(i64::from(days));
        let by_type = self.memories.type_stats(user_id, &since)?;
        let top_memories = self.memories.list(
            user_id,
            &MemoryFilter {
                since: Some(since),
                limit: SUMMARY_TOP,
                ..MemoryFilter::default()
            },
        )?;

        Ok(MemorySummary {
            period_days: days,
            total_memories: by_type.iter().map(|s| s.count).sum(),
            by_type,
            top_memories,
            relationship_count: self.relationships.count_for_user(user_id)?,
        })
    }

    /// Recently stored memories, newest first
    ///
    /// Served from the recent-context buffer; falls back to the last day of
    /// stored memories when the buffer is empty.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub async fn get_recent_context(&self, user_id: &str, limit: usize) -> Result<Vec<RecentEntry>> {
        let recent = self.recent.recent(user_id, limit).await;
        if !recent.is_empty() {
            return Ok(recent);
        }

        let mut memories = self.structured_recall(
            user_id,
            &RecallQuery {
                limit,
                ..RecallQuery::default()
            },
        )?;
        memories.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(memories
            .iter()
            .map(|m| RecentEntry::from_memory(m, self.config.summary_chars))
            .collect())
    }

    /// Chronological window for habit analysis
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn window(&self, user_id: &str, days: i64, limit: usize) -> Result<Vec<Memory>> {
        let since = Utc::now() - Duration::days(days);
        self.memories.window(user_id, &since, limit)
    }

    /// Context update memories stored since `since`, newest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn context_updates_since(
        &self,
        user_id: &str,
        since: &chrono::DateTime<Utc>,
    ) -> Result<Vec<Memory>> {
        self.memories.context_updates_since(user_id, since)
    }

    async fn embed_soft(&self, text: &str) -> Option<Vec<f32>> {
        let embedder = self.embedder.as_ref()?;
        match embedder.embed(text).await {
            Ok(vector) => Some(vector),
            Err(e) => {
                tracing::warn!(error = %e, "embedding failed, continuing without vector");
                None
            }
        }
    }

    fn existing_related(&self, user_id: &str, ids: Vec<String>) -> Result<Vec<String>> {
        let unique: BTreeSet<String> = ids.into_iter().collect();

        let mut existing = Vec::with_capacity(unique.len());
        for id in unique {
            if self.get(user_id, &id)?.is_some() {
                existing.push(id);
            } else {
                tracing::warn!(user_id = %user_id, related_id = %id, "ignoring unknown related memory");
            }
        }
        Ok(existing)
    }

    fn link_related(&self, memory: &Memory, related: &[String]) -> Result<()> {
        let mut edges = 0_u32;
        for target in related {
            let added = self.relationships.add(&Relationship {
                user_id: memory.user_id.clone(),
                source_id: memory.id.clone(),
                target_id: target.clone(),
                relationship_type: RELATED_TO.to_string(),
                strength: RELATED_STRENGTH,
                context: Value::Object(Map::new()),
                created_at: memory.created_at,
            })?;

            if added {
                edges += 1;
                self.memories.reinforce(target, REFERENCE_BOOST)?;
            }
        }

        if edges > 0 {
            let boost = (PER_EDGE_BOOST * f64::from(edges)).min(MAX_EDGE_BOOST);
            self.memories.reinforce(&memory.id, boost)?;
        }
        Ok(())
    }

    /// Reminder scheduling is best-effort; the memory itself is already stored
    fn schedule_reminder(&self, memory: &Memory) {
        let urgency = analyze_urgency(&memory.content, memory.importance);
        let at = Utc::now() + reminder_delay(urgency, &memory.content);
        let task = ProactiveTask::new(
            &memory.user_id,
            TaskKind::MemoryReminder {
                memory_id: memory.id.clone(),
                content: memory.content.clone(),
                urgency,
            },
            at,
            urgency.priority(),
        );

        match self.tasks.schedule(&task) {
            Ok(()) => tracing::debug!(
                user_id = %memory.user_id,
                memory_id = %memory.id,
                urgency = ?urgency,
                scheduled_for = %at,
                "scheduled memory reminder"
            ),
            Err(e) => tracing::warn!(
                user_id = %memory.user_id,
                memory_id = %memory.id,
                error = %e,
                "failed to schedule memory reminder"
            ),
        }
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("embedder", &self.embedder.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
