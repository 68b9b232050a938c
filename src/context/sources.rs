//! External context sources (email, calendar, reminders)
//!
//! The aggregator only needs point-in-time snapshots; how a source talks to
//! its provider is its own business.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Sender-assigned priority of an email
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailPriority {
    Low,
    #[default]
    Normal,
    High,
}

/// An unread email
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub id: String,
    pub sender: String,
    pub subject: String,
    /// Flagged important by the provider; counts as urgent
    #[serde(default)]
    pub is_important: bool,
    #[serde(default)]
    pub priority: EmailPriority,
    pub received_at: Option<DateTime<Utc>>,
}

/// A calendar event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// An active (not completed) reminder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderItem {
    pub id: String,
    pub title: String,
    pub due_at: DateTime<Utc>,
}

/// Unread mail for a user
#[async_trait]
pub trait EmailSource: Send + Sync {
    async fn unread(&self, user_id: &str) -> Result<Vec<EmailMessage>>;
}

/// Calendar events for a user
#[async_trait]
pub trait CalendarSource: Send + Sync {
    /// Events starting in `[start, end)`
    async fn events_between(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>>;
}

/// Active reminders for a user
#[async_trait]
pub trait ReminderSource: Send + Sync {
    async fn reminders(&self, user_id: &str) -> Result<Vec<ReminderItem>>;
}

/// Source for deployments without a provider; always empty
#[derive(Debug, Clone, Copy, Default)]
pub struct Unconfigured;

#[async_trait]
impl EmailSource for Unconfigured {
    async fn unread(&self, _user_id: &str) -> Result<Vec<EmailMessage>> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl CalendarSource for Unconfigured {
    async fn events_between(
        &self,
        _user_id: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl ReminderSource for Unconfigured {
    async fn reminders(&self, _user_id: &str) -> Result<Vec<ReminderItem>> {
        Ok(Vec::new())
    }
}
