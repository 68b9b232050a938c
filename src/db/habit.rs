//! Habit repository

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{DbPool, format_timestamp, parse_optional_timestamp, parse_timestamp};
use crate::habits::{PatternData, PatternType};
use crate::{Error, Result};

/// Column list for all habit SELECT queries
const HABIT_COLUMNS: &str = "id, user_id, pattern_key, pattern_data, confidence, observation_count, last_observed, next_predicted, active, created_at, updated_at";

/// A detected habit
#[derive(Debug, Clone)]
pub struct Habit {
    pub id: String,
    pub user_id: String,
    /// Merge key this habit is stored under
    pub pattern_key: String,
    pub pattern: PatternData,
    /// Confidence in `[0.0, 1.0]`
    pub confidence: f64,
    pub observation_count: u32,
    pub last_observed: Option<DateTime<Utc>>,
    pub next_predicted: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Habit {
    /// Create a new active habit
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        pattern_key: impl Into<String>,
        pattern: PatternData,
        confidence: f64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: format!("hab_{}", Uuid::new_v4()),
            user_id: user_id.into(),
            pattern_key: pattern_key.into(),
            observation_count: u32::try_from(pattern.occurrences()).unwrap_or(u32::MAX),
            pattern,
            confidence: confidence.clamp(0.0, 1.0),
            last_observed: None,
            next_predicted: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub const fn pattern_type(&self) -> PatternType {
        self.pattern.pattern_type()
    }

    #[must_use]
    pub fn action(&self) -> &str {
        self.pattern.action()
    }
}

/// Habit repository
#[derive(Debug, Clone)]
pub struct HabitRepo {
    pool: DbPool,
}

impl HabitRepo {
    /// Create a new habit repository
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert a new habit
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails (including a duplicate key)
    pub fn insert(&self, habit: &Habit) -> Result<()> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        let pattern_json = serde_json::to_string(&habit.pattern)?;

        conn.execute(
            r"INSERT INTO habits (id, user_id, pattern_type, pattern_key, pattern_data, confidence, observation_count, last_observed, next_predicted, active, created_at, updated_at)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            rusqlite::params![
                habit.id,
                habit.user_id,
                habit.pattern_type().as_str(),
                habit.pattern_key,
                pattern_json,
                habit.confidence,
                habit.observation_count,
                habit.last_observed.as_ref().map(format_timestamp),
                habit.next_predicted.as_ref().map(format_timestamp),
                i32::from(habit.active),
                format_timestamp(&habit.created_at),
                format_timestamp(&habit.updated_at),
            ],
        )?;

        Ok(())
    }

    /// Write back the mutable fields of an existing habit
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn update(&self, habit: &Habit) -> Result<bool> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        let pattern_json = serde_json::to_string(&habit.pattern)?;

        let changed = conn.execute(
            r"UPDATE habits SET pattern_data = ?1, confidence = ?2, observation_count = ?3,
                  last_observed = ?4, next_predicted = ?5, active = ?6, updated_at = ?7
              WHERE id = ?8",
            rusqlite::params![
                pattern_json,
                habit.confidence,
                habit.observation_count,
                habit.last_observed.as_ref().map(format_timestamp),
                habit.next_predicted.as_ref().map(format_timestamp),
                i32::from(habit.active),
                format_timestamp(&Utc::now()),
                habit.id,
            ],
        )?;

        Ok(changed > 0)
    }

    /// Get a habit by ID
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get(&self, user_id: &str, id: &str) -> Result<Option<Habit>> {
        self.query_one(
            &format!("SELECT {HABIT_COLUMNS} FROM habits WHERE user_id = ?1 AND id = ?2"),
            [user_id, id],
        )
    }

    /// Find a habit by its merge key
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn find_by_key(&self, user_id: &str, pattern_key: &str) -> Result<Option<Habit>> {
        self.query_one(
            &format!("SELECT {HABIT_COLUMNS} FROM habits WHERE user_id = ?1 AND pattern_key = ?2"),
            [user_id, pattern_key],
        )
    }

    /// Active habits for a user, most confident first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list_active(&self, user_id: &str) -> Result<Vec<Habit>> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {HABIT_COLUMNS} FROM habits WHERE user_id = ?1 AND active = 1 ORDER BY confidence DESC, updated_at DESC"
        ))?;

        let rows = stmt.query_map([user_id], row_to_habit_row)?;
        Ok(rows.flatten().filter_map(HabitRow::into_habit).collect())
    }

    fn query_one(&self, sql: &str, params: [&str; 2]) -> Result<Option<Habit>> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        match conn.query_row(sql, params, row_to_habit_row) {
            Ok(row) => Ok(row.into_habit()),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn row_to_habit_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<HabitRow> {
    Ok(HabitRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        pattern_key: row.get(2)?,
        pattern_data: row.get(3)?,
        confidence: row.get(4)?,
        observation_count: row.get(5)?,
        last_observed: row.get(6)?,
        next_predicted: row.get(7)?,
        active: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// Internal row representation for habit queries
struct HabitRow {
    id: String,
    user_id: String,
    pattern_key: String,
    pattern_data: String,
    confidence: f64,
    observation_count: u32,
    last_observed: Option<String>,
    next_predicted: Option<String>,
    active: i32,
    created_at: String,
    updated_at: String,
}

impl HabitRow {
    /// Rows whose pattern data no longer parses are skipped
    fn into_habit(self) -> Option<Habit> {
        let pattern = match serde_json::from_str::<PatternData>(&self.pattern_data) {
            Ok(pattern) => pattern,
            Err(e) => {
                tracing::warn!(habit_id = %self.id, error = %e, "skipping habit with unreadable pattern data");
                return None;
            }
        };

        Some(Habit {
            id: self.id,
            user_id: self.user_id,
            pattern_key: self.pattern_key,
            pattern,
            confidence: self.confidence,
            observation_count: self.observation_count,
            last_observed: parse_optional_timestamp(self.last_observed.as_deref()),
            next_predicted: parse_optional_timestamp(self.next_predicted.as_deref()),
            active: self.active != 0,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
        })
    }
}
