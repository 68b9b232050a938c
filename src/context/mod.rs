//! Context aggregator
//!
//! Merges email, calendar, reminder and habit snapshots into one cached
//! per-user view and derives priority alerts from it.

mod alerts;
mod conflicts;
mod sources;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use mini_moka::sync::Cache;
use serde_json::{Map, Value};

pub use alerts::{AlertKind, PriorityAlert, priority_alerts};
pub use conflicts::{Conflict, detect_conflicts};
pub use sources::{
    CalendarEvent, CalendarSource, EmailMessage, EmailPriority, EmailSource, ReminderItem,
    ReminderSource, Unconfigured,
};

use crate::Result;
use crate::config::ContextConfig;
use crate::db::{Habit, Memory, MemoryType};
use crate::habits::HabitEngine;
use crate::memory::{MemoryStore, NewMemory, RecallQuery, truncate_chars};
use crate::proactive::{
    DEFAULT_DUE_WINDOW_HOURS, Priority, Suggestion, habit_suggestions, rank_suggestions,
};

/// Items kept in each "top N" list
const TOP_ITEMS: usize = 3;

/// Habits predicted within this many hours count as due soon
const HABIT_DUE_SOON_HOURS: i64 = 2;

const CONVERSATION_CHARS: usize = 100;
const CONVERSATION_LIMIT: usize = 10;
const CONTACT_LOOKBACK_HOURS: u32 = 24 * 7;
const CONTACT_LIMIT: usize = 20;
const TOP_CONTACTS: usize = 5;

const SNAPSHOT_IMPORTANCE: f64 = 0.4;

/// Context updates scanned per change detection
const CHANGE_SCAN_LIMIT: usize = 50;
const CHANGE_THRESHOLD: f64 = 0.7;
const MAX_CHANGES: usize = 10;

/// Email counts and the most pressing messages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailStatus {
    pub total_unread: usize,
    pub urgent_count: usize,
    pub important_count: usize,
    pub low_priority_count: usize,
    pub recent_urgent: Vec<EmailMessage>,
    pub recent_important: Vec<EmailMessage>,
}

/// Calendar counts, conflicts and the next event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalendarStatus {
    pub upcoming_count: usize,
    pub today_count: usize,
    pub conflict_count: usize,
    pub next_event: Option<CalendarEvent>,
    pub conflicts: Vec<Conflict>,
}

/// Reminder counts with the overdue and upcoming heads
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReminderStatus {
    pub active_count: usize,
    pub overdue_count: usize,
    pub upcoming_count: usize,
    pub overdue: Vec<ReminderItem>,
    pub upcoming: Vec<ReminderItem>,
}

/// Habit counts with due-soon habits and suggestions
#[derive(Debug, Clone, Default)]
pub struct HabitStatus {
    pub total_habits: usize,
    pub due_soon_count: usize,
    pub due_soon: Vec<Habit>,
    pub suggestions: Vec<Suggestion>,
}

/// A recent SMS exchange
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSnippet {
    pub memory_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub importance: f64,
}

/// Interaction tally for one contact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactActivity {
    pub name: String,
    pub interaction_count: usize,
    pub last_interaction: DateTime<Utc>,
}

/// Contacts the user dealt with lately
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipContext {
    pub recent_contacts: usize,
    pub top_contacts: Vec<ContactActivity>,
}

/// Merged view of a user's current state
#[derive(Debug, Clone)]
pub struct UserContext {
    pub user_id: String,
    pub generated_at: DateTime<Utc>,
    pub recent_conversations: Vec<ConversationSnippet>,
    pub email: EmailStatus,
    pub calendar: CalendarStatus,
    pub reminders: ReminderStatus,
    pub habits: HabitStatus,
    pub relationships: RelationshipContext,
    pub alerts: Vec<PriorityAlert>,
}

impl UserContext {
    /// One-line summary stored with each snapshot
    #[must_use]
    pub fn snapshot_text(&self) -> String {
        let mut parts = Vec::new();
        if self.email.urgent_count > 0 {
            parts.push(format!("{} urgent emails", self.email.urgent_count));
        }
        if self.calendar.upcoming_count > 0 {
            parts.push(format!("{} upcoming events", self.calendar.upcoming_count));
        }
        if self.reminders.overdue_count > 0 {
            parts.push(format!("{} overdue reminders", self.reminders.overdue_count));
        }

        if parts.is_empty() {
            "Context: All clear, no urgent items".to_string()
        } else {
            format!("Context: {}", parts.join(", "))
        }
    }

    /// "Daily Summary: ..." line
    #[must_use]
    pub fn daily_summary(&self) -> String {
        let mut parts = Vec::new();
        if self.email.total_unread > 0 {
            parts.push(format!("📧 {} unread emails", self.email.total_unread));
            if self.email.urgent_count > 0 {
                parts.push(format!("🚨 {} urgent", self.email.urgent_count));
            }
        }
        if self.calendar.today_count > 0 {
            parts.push(format!("📅 {} events today", self.calendar.today_count));
        }
        if self.reminders.active_count > 0 {
            parts.push(format!("⏰ {} active reminders", self.reminders.active_count));
        }

        if parts.is_empty() {
            "Daily Summary: All clear, have a great day!".to_string()
        } else {
            format!("Daily Summary: {}", parts.join(" | "))
        }
    }

    /// Alerts at the given priority
    pub fn alerts_at(&self, priority: Priority) -> impl Iterator<Item = &PriorityAlert> {
        self.alerts.iter().filter(move |a| a.priority == priority)
    }
}

/// A context update judged significant
#[derive(Debug, Clone, PartialEq)]
pub struct ContextChange {
    pub memory_id: String,
    pub source: String,
    pub significance: f64,
    pub created_at: DateTime<Utc>,
    pub action_required: bool,
}

/// What tomorrow holds, for the evening digest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TomorrowPreview {
    pub reminders: Vec<ReminderItem>,
    pub events: Vec<CalendarEvent>,
}

/// The three external sources the aggregator reads
#[derive(Clone)]
pub struct ContextSources {
    pub email: Arc<dyn EmailSource>,
    pub calendar: Arc<dyn CalendarSource>,
    pub reminders: Arc<dyn ReminderSource>,
}

impl Default for ContextSources {
    fn default() -> Self {
        Self {
            email: Arc::new(Unconfigured),
            calendar: Arc::new(Unconfigured),
            reminders: Arc::new(Unconfigured),
        }
    }
}

/// Context aggregation service
#[derive(Clone)]
pub struct ContextAggregator {
    memories: MemoryStore,
    habits: HabitEngine,
    sources: ContextSources,
    cache: Cache<String, Arc<UserContext>>,
    config: ContextConfig,
}

impl ContextAggregator {
    #[must_use]
    pub fn new(
        memories: MemoryStore,
        habits: HabitEngine,
        sources: ContextSources,
        config: ContextConfig,
    ) -> Self {
        Self {
            memories,
            habits,
            sources,
            cache: Cache::builder()
                .max_capacity(config.cache_capacity)
                .time_to_live(config.cache_ttl)
                .build(),
            config,
        }
    }

    /// Current context, from cache unless stale or `force_refresh`
    ///
    /// A fresh build stores a `context_snapshot` memory. Failing sources
    /// contribute empty statuses.
    ///
    /// # Errors
    ///
    /// Returns error if the memory or habit store fails
    pub async fn get_full_context(
        &self,
        user_id: &str,
        force_refresh: bool,
    ) -> Result<Arc<UserContext>> {
        if !force_refresh {
            if let Some(cached) = self.cache.get(&user_id.to_string()) {
                tracing::debug!(user_id = %user_id, "context cache hit");
                return Ok(cached);
            }
        }

        let context = Arc::new(self.build(user_id).await?);
        self.store_snapshot(&context).await;
        self.cache.insert(user_id.to_string(), Arc::clone(&context));

        tracing::debug!(user_id = %user_id, alerts = context.alerts.len(), "built fresh context");
        Ok(context)
    }

    /// Drop a user's cached context
    pub fn invalidate(&self, user_id: &str) {
        self.cache.invalidate(&user_id.to_string());
    }

    /// Record an update pushed by a source and invalidate the cache
    ///
    /// Important emails, calendar conflicts and overdue reminders also raise
    /// a `proactive_alert` memory. Returns the update's memory id.
    ///
    /// # Errors
    ///
    /// Returns error if the update cannot be stored
    pub async fn update_stream(
        &self,
        user_id: &str,
        source: &str,
        data: Value,
        importance: f64,
    ) -> Result<String> {
        let mut context_data = Map::new();
        context_data.insert("source".to_string(), Value::String(source.to_string()));
        context_data.insert("data".to_string(), data.clone());

        let memory_id = self
            .memories
            .store(
                NewMemory::new(
                    user_id,
                    MemoryType::context_update(source),
                    format!("Context update from {source}: {data}"),
                )
                .with_context(context_data)
                .with_importance(importance)
                .without_reminder(),
            )
            .await?;

        self.invalidate(user_id);

        if let Some((content, alert_type, importance)) = proactive_trigger(source, &data) {
            let mut alert_data = Map::new();
            alert_data.insert("alert_type".to_string(), Value::String(alert_type.to_string()));
            alert_data.insert("source_data".to_string(), data);
            alert_data.insert("action_required".to_string(), Value::Bool(true));

            self.memories
                .store(
                    NewMemory::new(user_id, MemoryType::ProactiveAlert, content)
                        .with_context(alert_data)
                        .with_importance(importance)
                        .without_reminder(),
                )
                .await?;
            tracing::info!(user_id = %user_id, alert_type, "raised proactive alert");
        }

        tracing::debug!(user_id = %user_id, source = %source, "context stream updated");
        Ok(memory_id)
    }

    /// Significant context updates from the last `hours_back` hours
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn detect_changes(&self, user_id: &str, hours_back: u32) -> Result<Vec<ContextChange>> {
        let since = Utc::now() - Duration::hours(i64::from(hours_back));
        let updates = self.memories.context_updates_since(user_id, &since)?;

        let mut changes: Vec<ContextChange> = updates
            .iter()
            .take(CHANGE_SCAN_LIMIT)
            .map(score_change)
            .filter(|c| c.significance > CHANGE_THRESHOLD)
            .collect();

        changes.sort_by(|a, b| b.significance.total_cmp(&a.significance));
        changes.truncate(MAX_CHANGES);
        Ok(changes)
    }

    /// "Daily Summary: ..." for the user's current context
    ///
    /// # Errors
    ///
    /// Returns error if the context cannot be built
    pub async fn daily_summary(&self, user_id: &str) -> Result<String> {
        Ok(self.get_full_context(user_id, false).await?.daily_summary())
    }

    /// Reminders and events falling on the next UTC day
    pub async fn tomorrow_preview(&self, user_id: &str) -> TomorrowPreview {
        let (start, end) = day_bounds(Utc::now() + Duration::days(1));

        let events = match self.sources.calendar.events_between(user_id, start, end).await {
            Ok(mut events) => {
                events.sort_by_key(|e| e.start);
                events
            }
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "calendar source failed");
                Vec::new()
            }
        };

        let reminders = match self.sources.reminders.reminders(user_id).await {
            Ok(reminders) => {
                let mut tomorrow: Vec<ReminderItem> = reminders
                    .into_iter()
                    .filter(|r| r.due_at >= start && r.due_at < end)
                    .collect();
                tomorrow.sort_by_key(|r| r.due_at);
                tomorrow
            }
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "reminder source failed");
                Vec::new()
            }
        };

        TomorrowPreview { reminders, events }
    }

    async fn build(&self, user_id: &str) -> Result<UserContext> {
        let now = Utc::now();

        let email = self.email_status(user_id).await;
        let calendar = self.calendar_status(user_id, now).await;
        let reminders = self.reminder_status(user_id, now).await;
        let habits = self.habit_status(user_id, now)?;
        let recent_conversations = self.recent_conversations(user_id).await?;
        let relationships = self.relationship_context(user_id).await?;
        let alerts = priority_alerts(&email, &calendar, &reminders, &habits);

        Ok(UserContext {
            user_id: user_id.to_string(),
            generated_at: now,
            recent_conversations,
            email,
            calendar,
            reminders,
            habits,
            relationships,
            alerts,
        })
    }

    async fn email_status(&self, user_id: &str) -> EmailStatus {
        let unread = match self.sources.email.unread(user_id).await {
            Ok(unread) => unread,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "email source failed");
                return EmailStatus::default();
            }
        };

        let total_unread = unread.len();
        let (urgent, rest): (Vec<EmailMessage>, Vec<EmailMessage>) =
            unread.into_iter().partition(|m| m.is_important);
        let (important, low): (Vec<EmailMessage>, Vec<EmailMessage>) = rest
            .into_iter()
            .partition(|m| m.priority == EmailPriority::High);

        EmailStatus {
            total_unread,
            urgent_count: urgent.len(),
            important_count: important.len(),
            low_priority_count: low.len(),
            recent_urgent: urgent.into_iter().take(TOP_ITEMS).collect(),
            recent_important: important.into_iter().take(TOP_ITEMS).collect(),
        }
    }

    async fn calendar_status(&self, user_id: &str, now: DateTime<Utc>) -> CalendarStatus {
        let horizon = now + Duration::hours(self.config.calendar_lookahead_hours);
        let mut upcoming = match self.sources.calendar.events_between(user_id, now, horizon).await {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "calendar source failed");
                return CalendarStatus::default();
            }
        };
        upcoming.sort_by_key(|e| e.start);

        let (day_start, day_end) = day_bounds(now);
        let today_count = match self
            .sources
            .calendar
            .events_between(user_id, day_start, day_end)
            .await
        {
            Ok(events) => events.len(),
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "calendar source failed");
                0
            }
        };

        let conflicts = detect_conflicts(&upcoming);
        CalendarStatus {
            upcoming_count: upcoming.len(),
            today_count,
            conflict_count: conflicts.len(),
            next_event: upcoming.first().cloned(),
            conflicts: conflicts.into_iter().take(TOP_ITEMS).collect(),
        }
    }

    async fn reminder_status(&self, user_id: &str, now: DateTime<Utc>) -> ReminderStatus {
        let mut active = match self.sources.reminders.reminders(user_id).await {
            Ok(reminders) => reminders,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "reminder source failed");
                return ReminderStatus::default();
            }
        };
        active.sort_by_key(|r| r.due_at);

        let window_end = now + Duration::hours(self.config.upcoming_reminder_hours);
        let overdue: Vec<ReminderItem> =
            active.iter().filter(|r| r.due_at < now).cloned().collect();
        let upcoming: Vec<ReminderItem> = active
            .iter()
            .filter(|r| r.due_at >= now && r.due_at <= window_end)
            .cloned()
            .collect();

        ReminderStatus {
            active_count: active.len(),
            overdue_count: overdue.len(),
            upcoming_count: upcoming.len(),
            overdue: overdue.into_iter().take(TOP_ITEMS).collect(),
            upcoming: upcoming.into_iter().take(TOP_ITEMS).collect(),
        }
    }

    fn habit_status(&self, user_id: &str, now: DateTime<Utc>) -> Result<HabitStatus> {
        let habits = self.habits.list(user_id)?;
        let cutoff = now + Duration::hours(HABIT_DUE_SOON_HOURS);

        let due_soon: Vec<Habit> = habits
            .iter()
            .filter(|h| h.next_predicted.is_some_and(|t| t <= cutoff))
            .cloned()
            .collect();

        let suggestions = rank_suggestions(
            habit_suggestions(&habits, now, DEFAULT_DUE_WINDOW_HOURS),
            TOP_ITEMS,
        );

        Ok(HabitStatus {
            total_habits: habits.len(),
            due_soon_count: due_soon.len(),
            due_soon: due_soon.into_iter().take(TOP_ITEMS).collect(),
            suggestions,
        })
    }

    async fn recent_conversations(&self, user_id: &str) -> Result<Vec<ConversationSnippet>> {
        let memories = self
            .memories
            .recall(
                user_id,
                &RecallQuery::of_type(MemoryType::Sms, 24, CONVERSATION_LIMIT),
            )
            .await?;

        Ok(memories
            .into_iter()
            .map(|m| ConversationSnippet {
                content: truncate_chars(&m.content, CONVERSATION_CHARS),
                memory_id: m.id,
                created_at: m.created_at,
                importance: m.importance,
            })
            .collect())
    }

    async fn relationship_context(&self, user_id: &str) -> Result<RelationshipContext> {
        let interactions = self
            .memories
            .recall(
                user_id,
                &RecallQuery::of_type(
                    MemoryType::ContactInteraction,
                    CONTACT_LOOKBACK_HOURS,
                    CONTACT_LIMIT,
                ),
            )
            .await?;

        let mut by_contact: BTreeMap<String, ContactActivity> = BTreeMap::new();
        for memory in &interactions {
            let name = memory.context_str("contact_name").unwrap_or("Unknown");
            by_contact
                .entry(name.to_string())
                .and_modify(|a| {
                    a.interaction_count += 1;
                    a.last_interaction = a.last_interaction.max(memory.created_at);
                })
                .or_insert_with(|| ContactActivity {
                    name: name.to_string(),
                    interaction_count: 1,
                    last_interaction: memory.created_at,
                });
        }

        let recent_contacts = by_contact.len();
        let mut top_contacts: Vec<ContactActivity> = by_contact.into_values().collect();
        top_contacts.sort_by(|a, b| b.interaction_count.cmp(&a.interaction_count));
        top_contacts.truncate(TOP_CONTACTS);

        Ok(RelationshipContext {
            recent_contacts,
            top_contacts,
        })
    }

    async fn store_snapshot(&self, context: &UserContext) {
        let mut data = Map::new();
        data.insert("snapshot_type".to_string(), Value::String("daily".to_string()));
        data.insert("alert_count".to_string(), Value::from(context.alerts.len()));

        let snapshot = NewMemory::new(
            &context.user_id,
            MemoryType::ContextSnapshot,
            context.snapshot_text(),
        )
        .with_context(data)
        .with_importance(SNAPSHOT_IMPORTANCE)
        .without_reminder();

        if let Err(e) = self.memories.store(snapshot).await {
            tracing::warn!(user_id = %context.user_id, error = %e, "failed to store context snapshot");
        }
    }
}

impl std::fmt::Debug for ContextAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextAggregator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Alert memory raised by a pushed update: (content, alert type, importance)
fn proactive_trigger(source: &str, data: &Value) -> Option<(String, &'static str, f64)> {
    let flag = |key: &str| data.get(key).and_then(Value::as_bool).unwrap_or(false);
    let text = |key: &str, fallback: &str| {
        data.get(key)
            .and_then(Value::as_str)
            .unwrap_or(fallback)
            .to_string()
    };

    match source {
        "email" if flag("is_important") => Some((
            format!("Urgent email alert: {}", text("subject", "No subject")),
            "urgent_email",
            0.9,
        )),
        "calendar" if flag("conflict_detected") => Some((
            format!("Calendar conflict detected: {}", text("title", "Unknown conflict")),
            "calendar_conflict",
            0.8,
        )),
        "reminder" if flag("is_overdue") => Some((
            format!("Overdue reminder: {}", text("title", "Unknown reminder")),
            "overdue_reminder",
            0.7,
        )),
        _ => None,
    }
}

fn score_change(update: &Memory) -> ContextChange {
    let source = update
        .memory_type
        .context_update_source()
        .unwrap_or_default()
        .to_string();
    let data = update.context_data.get("data");
    let field = |key: &str| data.and_then(|d| d.get(key));

    let mut significance: f64 = 0.5;
    match source.as_str() {
        "email" | "calendar" => significance += 0.2,
        "reminder" | "habit" => significance += 0.1,
        _ => {}
    }
    if field("is_important").and_then(Value::as_bool).unwrap_or(false) {
        significance += 0.3;
    }
    if field("priority").and_then(Value::as_str) == Some("high") {
        significance += 0.2;
    }
    if update.content.chars().count() > 100 {
        significance += 0.1;
    }

    ContextChange {
        memory_id: update.id.clone(),
        action_required: field("action_required")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        source,
        significance: significance.min(1.0),
        created_at: update.created_at,
    }
}

/// Start and end of the UTC day containing `at`
fn day_bounds(at: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = at
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map_or(at, |midnight| midnight.and_utc());
    (start, start + Duration::days(1))
}
