//! User repository

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{DbPool, format_timestamp, parse_timestamp};
use crate::{Error, Result};

const USER_COLUMNS: &str = "id, phone_number, name, active, preferences, created_at, updated_at";

/// Per-user proactive messaging preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPreferences {
    /// Master switch for unsolicited messages
    pub proactive_mode: bool,
    pub morning_digest: bool,
    pub morning_digest_time: NaiveTime,
    pub evening_digest: bool,
    pub evening_digest_time: NaiveTime,
    pub habit_reminders: bool,
    pub urgent_email_alerts: bool,
    pub calendar_alerts: bool,
    pub reminder_alerts: bool,
    pub wake_up_calls: bool,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            proactive_mode: true,
            morning_digest: true,
            morning_digest_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            evening_digest: true,
            evening_digest_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or(NaiveTime::MIN),
            habit_reminders: true,
            urgent_email_alerts: true,
            calendar_alerts: true,
            reminder_alerts: true,
            wake_up_calls: true,
        }
    }
}

/// A user reachable over SMS
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub phone_number: String,
    pub name: Option<String>,
    pub active: bool,
    pub preferences: UserPreferences,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User repository
#[derive(Debug, Clone)]
pub struct UserRepo {
    pool: DbPool,
}

impl UserRepo {
    /// Create a new user repository
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Find a user by phone number or create one with default preferences
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn find_or_create(&self, phone_number: &str, name: Option<&str>) -> Result<User> {
        if let Some(user) = self.find_by_phone(phone_number)? {
            return Ok(user);
        }

        let now = Utc::now();
        let user = User {
            id: format!("usr_{}", Uuid::new_v4()),
            phone_number: phone_number.to_string(),
            name: name.map(ToString::to_string),
            active: true,
            preferences: UserPreferences::default(),
            created_at: now,
            updated_at: now,
        };

        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        conn.execute(
            &format!("INSERT INTO users ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)"),
            rusqlite::params![
                user.id,
                user.phone_number,
                user.name,
                i32::from(user.active),
                serde_json::to_string(&user.preferences)?,
                format_timestamp(&now),
            ],
        )?;

        tracing::info!(user_id = %user.id, "created user");
        Ok(user)
    }

    /// Find a user by ID
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn find(&self, id: &str) -> Result<Option<User>> {
        self.query_one(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"), id)
    }

    /// Find a user by phone number
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn find_by_phone(&self, phone_number: &str) -> Result<Option<User>> {
        self.query_one(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE phone_number = ?1"),
            phone_number,
        )
    }

    /// All active users
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list_active(&self) -> Result<Vec<User>> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE active = 1 ORDER BY created_at"
        ))?;

        let rows = stmt.query_map([], row_to_user)?;
        Ok(rows.flatten().collect())
    }

    /// Replace a user's preferences
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails or the user does not exist
    pub fn set_preferences(&self, id: &str, preferences: &UserPreferences) -> Result<()> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        let changed = conn.execute(
            "UPDATE users SET preferences = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![
                serde_json::to_string(preferences)?,
                format_timestamp(&Utc::now()),
                id
            ],
        )?;

        if changed == 0 {
            return Err(Error::NotFound(format!("user {id}")));
        }
        Ok(())
    }

    /// Activate or deactivate a user
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn set_active(&self, id: &str, active: bool) -> Result<bool> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        let changed = conn.execute(
            "UPDATE users SET active = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![i32::from(active), format_timestamp(&Utc::now()), id],
        )?;
        Ok(changed > 0)
    }

    fn query_one(&self, sql: &str, param: &str) -> Result<Option<User>> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        match conn.query_row(sql, [param], row_to_user) {
            Ok(user) => Ok(Some(user)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let active: i32 = row.get(3)?;
    let preferences: String = row.get(4)?;
    let created_at: String = row.get(5)?;
    let updated_at: String = row.get(6)?;

    Ok(User {
        id: row.get(0)?,
        phone_number: row.get(1)?,
        name: row.get(2)?,
        active: active != 0,
        preferences: serde_json::from_str(&preferences).unwrap_or_default(),
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn find_or_create_is_stable() {
        let repo = UserRepo::new(db::init_memory().unwrap());
        let first = repo.find_or_create("+15551234567", Some("Ada")).unwrap();
        let second = repo.find_or_create("+15551234567", None).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.name.as_deref(), Some("Ada"));
        assert!(second.preferences.proactive_mode);
    }

    #[test]
    fn preferences_persist_and_partial_json_uses_defaults() {
        let repo = UserRepo::new(db::init_memory().unwrap());
        let user = repo.find_or_create("+15550000001", None).unwrap();

        let mut prefs = user.preferences.clone();
        prefs.wake_up_calls = false;
        repo.set_preferences(&user.id, &prefs).unwrap();
        assert!(!repo.find(&user.id).unwrap().unwrap().preferences.wake_up_calls);

        let partial: UserPreferences = serde_json::from_str(r#"{"proactive_mode": false}"#).unwrap();
        assert!(!partial.proactive_mode);
        assert!(partial.morning_digest);

        assert!(repo.set_preferences("usr_missing", &prefs).is_err());
    }

    #[test]
    fn list_active_skips_inactive_users() {
        let repo = UserRepo::new(db::init_memory().unwrap());
        let a = repo.find_or_create("+15550000001", None).unwrap();
        let b = repo.find_or_create("+15550000002", None).unwrap();
        assert!(repo.set_active(&b.id, false).unwrap());

        let active = repo.list_active().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, a.id);
    }
}
