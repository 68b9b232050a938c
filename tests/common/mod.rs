//! Shared test utilities

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pluto::channels::OutboundChannel;
use pluto::config::{ContextConfig, HabitConfig, MemoryConfig, ProactiveConfig};
use pluto::context::{
    CalendarEvent, CalendarSource, EmailMessage, EmailSource, ReminderItem, ReminderSource,
};
use pluto::db::{self, Embed, User, UserRepo};
use pluto::{
    ContextAggregator, ContextSources, DbPool, Error, HabitEngine, MemoryStore, ProactiveAgent,
    Result,
};

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// Create a test user in the database
pub fn create_test_user(db: &DbPool, phone: &str) -> User {
    UserRepo::new(db.clone())
        .find_or_create(phone, Some("Test User"))
        .expect("failed to create test user")
}

const VOCABULARY: [&str; 8] = [
    "dentist", "groceries", "meeting", "mom", "gym", "report", "coffee", "flight",
];

/// Embeds text as word counts over a tiny fixed vocabulary
pub struct FakeEmbedder;

#[async_trait]
#[allow(clippy::cast_precision_loss)]
impl Embed for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let lower = text.to_lowercase();
        let mut vector: Vec<f32> = VOCABULARY
            .iter()
            .map(|word| lower.matches(word).count() as f32)
            .collect();
        // Keep every vector non-zero so cosine is defined
        vector.push(0.01);
        Ok(vector)
    }
}

/// Embedder whose backend is always down
pub struct FailingEmbedder;

#[async_trait]
impl Embed for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(Error::Embedding("backend unavailable".to_string()))
    }
}

/// Channel that records what it was asked to deliver
#[derive(Default)]
pub struct RecordingChannel {
    pub sms: Mutex<Vec<(String, String)>>,
    pub calls: Mutex<Vec<(String, String)>>,
    failing: AtomicBool,
}

impl RecordingChannel {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent_bodies(&self) -> Vec<String> {
        self.sms
            .lock()
            .unwrap()
            .iter()
            .map(|(_, body)| body.clone())
            .collect()
    }
}

#[async_trait]
impl OutboundChannel for RecordingChannel {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn send_sms(&self, to: &str, body: &str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Channel("carrier rejected message".to_string()));
        }
        self.sms
            .lock()
            .unwrap()
            .push((to.to_string(), body.to_string()));
        Ok(())
    }

    async fn place_call(&self, to: &str, message: &str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Channel("call failed".to_string()));
        }
        self.calls
            .lock()
            .unwrap()
            .push((to.to_string(), message.to_string()));
        Ok(())
    }
}

/// Fixed snapshots for every context source
#[derive(Default, Clone)]
pub struct StaticSources {
    pub emails: Vec<EmailMessage>,
    pub events: Vec<CalendarEvent>,
    pub reminders: Vec<ReminderItem>,
}

impl StaticSources {
    pub fn into_sources(self) -> ContextSources {
        let shared = Arc::new(self);
        ContextSources {
            email: shared.clone(),
            calendar: shared.clone(),
            reminders: shared,
        }
    }
}

#[async_trait]
impl EmailSource for StaticSources {
    async fn unread(&self, _user_id: &str) -> Result<Vec<EmailMessage>> {
        Ok(self.emails.clone())
    }
}

#[async_trait]
impl CalendarSource for StaticSources {
    async fn events_between(
        &self,
        _user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>> {
        Ok(self
            .events
            .iter()
            .filter(|e| e.start >= start && e.start < end)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ReminderSource for StaticSources {
    async fn reminders(&self, _user_id: &str) -> Result<Vec<ReminderItem>> {
        Ok(self.reminders.clone())
    }
}

/// Source whose provider is always down
pub struct FailingSource;

#[async_trait]
impl EmailSource for FailingSource {
    async fn unread(&self, _user_id: &str) -> Result<Vec<EmailMessage>> {
        Err(Error::Source("mail server unreachable".to_string()))
    }
}

#[async_trait]
impl CalendarSource for FailingSource {
    async fn events_between(
        &self,
        _user_id: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>> {
        Err(Error::Source("calendar unreachable".to_string()))
    }
}

#[async_trait]
impl ReminderSource for FailingSource {
    async fn reminders(&self, _user_id: &str) -> Result<Vec<ReminderItem>> {
        Err(Error::Source("reminders unreachable".to_string()))
    }
}

pub fn urgent_email(id: &str, subject: &str) -> EmailMessage {
    EmailMessage {
        id: id.to_string(),
        sender: "boss@example.com".to_string(),
        subject: subject.to_string(),
        is_important: true,
        priority: pluto::context::EmailPriority::High,
        received_at: None,
    }
}

/// Every service wired over one database
pub struct Services {
    pub pool: DbPool,
    pub memories: MemoryStore,
    pub habits: HabitEngine,
    pub context: ContextAggregator,
    pub agent: ProactiveAgent,
    pub channel: Arc<RecordingChannel>,
}

pub fn services(sources: ContextSources, proactive: ProactiveConfig) -> Services {
    let pool = setup_test_db();
    let memories = MemoryStore::new(pool.clone(), MemoryConfig::default());
    let habits = HabitEngine::new(pool.clone(), memories.clone(), HabitConfig::default());
    let context = ContextAggregator::new(
        memories.clone(),
        habits.clone(),
        sources,
        ContextConfig::default(),
    );
    let channel = Arc::new(RecordingChannel::default());
    let agent = ProactiveAgent::new(
        &pool,
        memories.clone(),
        habits.clone(),
        context.clone(),
        channel.clone(),
        proactive,
    );

    Services {
        pool,
        memories,
        habits,
        context,
        agent,
        channel,
    }
}
