//! Persisted proactive tasks (memory reminders, wake-up calls)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{DbPool, format_timestamp, parse_timestamp};
use crate::memory::Urgency;
use crate::proactive::Priority;
use crate::{Error, Result};

/// Default number of delivery attempts
pub const DEFAULT_MAX_RETRIES: u32 = 3;

const TASK_COLUMNS: &str =
    "id, user_id, scheduled_for, priority, payload, status, retry_count, max_retries, last_error, created_at";

/// What a task does when it comes due
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskKind {
    /// Text the user about a stored memory
    MemoryReminder {
        memory_id: String,
        content: String,
        urgency: Urgency,
    },
    /// Place a voice call reading out `message`
    WakeupCall { message: String },
}

impl TaskKind {
    const fn as_str(&self) -> &'static str {
        match self {
            Self::MemoryReminder { .. } => "memory_reminder",
            Self::WakeupCall { .. } => "wakeup_call",
        }
    }
}

/// Task lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Completed,
    Failed,
}

impl TaskStatus {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    fn from_str_value(s: &str) -> Self {
        match s {
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// A scheduled unit of proactive work
#[derive(Debug, Clone)]
pub struct ProactiveTask {
    pub id: String,
    pub user_id: String,
    pub kind: TaskKind,
    pub scheduled_for: DateTime<Utc>,
    pub priority: Priority,
    pub status: TaskStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ProactiveTask {
    /// Create a pending task
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        kind: TaskKind,
        scheduled_for: DateTime<Utc>,
        priority: Priority,
    ) -> Self {
        Self {
            id: format!("task_{}", Uuid::new_v4()),
            user_id: user_id.into(),
            kind,
            scheduled_for,
            priority,
            status: TaskStatus::Pending,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            last_error: None,
            created_at: Utc::now(),
        }
    }
}

/// Task repository
#[derive(Debug, Clone)]
pub struct TaskRepo {
    pool: DbPool,
}

impl TaskRepo {
    /// Create a new task repository
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Persist a new task
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn schedule(&self, task: &ProactiveTask) -> Result<()> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        let now = format_timestamp(&Utc::now());

        conn.execute(
            r"INSERT INTO proactive_tasks (id, user_id, task_kind, scheduled_for, priority, payload, status, retry_count, max_retries, last_error, created_at, updated_at)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            rusqlite::params![
                task.id,
                task.user_id,
                task.kind.as_str(),
                format_timestamp(&task.scheduled_for),
                task.priority.as_str(),
                serde_json::to_string(&task.kind)?,
                task.status.as_str(),
                task.retry_count,
                task.max_retries,
                task.last_error,
                format_timestamp(&task.created_at),
                now,
            ],
        )?;

        Ok(())
    }

    /// Pending tasks scheduled at or before `now`, oldest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn due(&self, now: &DateTime<Utc>, limit: usize) -> Result<Vec<ProactiveTask>> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM proactive_tasks
             WHERE status = 'pending' AND scheduled_for <= ?1
             ORDER BY scheduled_for ASC LIMIT ?2"
        ))?;

        #[allow(clippy::cast_possible_wrap)]
        let limit = limit as i64;
        let rows = stmt.query_map(rusqlite::params![format_timestamp(now), limit], row_to_task_row)?;
        Ok(rows.flatten().filter_map(TaskRow::into_task).collect())
    }

    /// Pending tasks for a user, soonest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn pending_for_user(&self, user_id: &str) -> Result<Vec<ProactiveTask>> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM proactive_tasks
             WHERE user_id = ?1 AND status = 'pending'
             ORDER BY scheduled_for ASC"
        ))?;

        let rows = stmt.query_map([user_id], row_to_task_row)?;
        Ok(rows.flatten().filter_map(TaskRow::into_task).collect())
    }

    /// Mark a task delivered
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn complete(&self, id: &str) -> Result<()> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        conn.execute(
            "UPDATE proactive_tasks SET status = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![
                TaskStatus::Completed.as_str(),
                format_timestamp(&Utc::now()),
                id
            ],
        )?;
        Ok(())
    }

    /// Record a failed attempt
    ///
    /// The task stays pending until it has used up its retries. Returns the
    /// resulting status.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn record_failure(&self, id: &str, error: &str) -> Result<TaskStatus> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        conn.execute(
            r"UPDATE proactive_tasks
              SET retry_count = retry_count + 1,
                  last_error = ?1,
                  status = CASE WHEN retry_count + 1 >= max_retries THEN 'failed' ELSE 'pending' END,
                  updated_at = ?2
              WHERE id = ?3",
            rusqlite::params![error, format_timestamp(&Utc::now()), id],
        )?;

        let status: String = conn.query_row(
            "SELECT status FROM proactive_tasks WHERE id = ?1",
            [id],
            |row| row.get(0),
        )?;
        Ok(TaskStatus::from_str_value(&status))
    }
}

fn row_to_task_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskRow> {
    Ok(TaskRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        scheduled_for: row.get(2)?,
        priority: row.get(3)?,
        payload: row.get(4)?,
        status: row.get(5)?,
        retry_count: row.get(6)?,
        max_retries: row.get(7)?,
        last_error: row.get(8)?,
        created_at: row.get(9)?,
    })
}

/// Internal row representation for task queries
struct TaskRow {
    id: String,
    user_id: String,
    scheduled_for: String,
    priority: String,
    payload: String,
    status: String,
    retry_count: u32,
    max_retries: u32,
    last_error: Option<String>,
    created_at: String,
}

impl TaskRow {
    fn into_task(self) -> Option<ProactiveTask> {
        let kind = match serde_json::from_str::<TaskKind>(&self.payload) {
            Ok(kind) => kind,
            Err(e) => {
                tracing::warn!(task_id = %self.id, error = %e, "skipping task with unreadable payload");
                return None;
            }
        };

        Some(ProactiveTask {
            id: self.id,
            user_id: self.user_id,
            kind,
            scheduled_for: parse_timestamp(&self.scheduled_for),
            priority: Priority::from_str_value(&self.priority).unwrap_or(Priority::Medium),
            status: TaskStatus::from_str_value(&self.status),
            retry_count: self.retry_count,
            max_retries: self.max_retries,
            last_error: self.last_error,
            created_at: parse_timestamp(&self.created_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::db;

    fn reminder() -> TaskKind {
        TaskKind::MemoryReminder {
            memory_id: "mem_1".to_string(),
            content: "Pay rent".to_string(),
            urgency: Urgency::High,
        }
    }

    #[test]
    fn due_returns_only_past_pending_tasks() {
        let repo = TaskRepo::new(db::init_memory().unwrap());
        let now = Utc::now();

        let past = ProactiveTask::new("u1", reminder(), now - Duration::minutes(5), Priority::High);
        let future = ProactiveTask::new("u1", reminder(), now + Duration::hours(1), Priority::High);
        repo.schedule(&past).unwrap();
        repo.schedule(&future).unwrap();

        let due = repo.due(&now, 10).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, past.id);
        assert_eq!(due[0].kind, reminder());

        repo.complete(&past.id).unwrap();
        assert!(repo.due(&now, 10).unwrap().is_empty());
        assert_eq!(repo.pending_for_user("u1").unwrap().len(), 1);
    }

    #[test]
    fn failures_retry_then_give_up() {
        let repo = TaskRepo::new(db::init_memory().unwrap());
        let task = ProactiveTask::new(
            "u1",
            TaskKind::WakeupCall { message: "Rise and shine".to_string() },
            Utc::now() - Duration::minutes(1),
            Priority::Medium,
        );
        repo.schedule(&task).unwrap();

        assert_eq!(repo.record_failure(&task.id, "busy").unwrap(), TaskStatus::Pending);
        assert_eq!(repo.record_failure(&task.id, "busy").unwrap(), TaskStatus::Pending);
        assert_eq!(repo.record_failure(&task.id, "busy").unwrap(), TaskStatus::Failed);
        assert!(repo.due(&Utc::now(), 10).unwrap().is_empty());
    }
}
