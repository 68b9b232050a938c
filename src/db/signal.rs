//! Ledger of delivered proactive signals

use chrono::{DateTime, Utc};

use super::{DbPool, format_timestamp, parse_optional_timestamp};
use crate::{Error, Result};

/// Signal repository
#[derive(Debug, Clone)]
pub struct SignalRepo {
    pool: DbPool,
}

impl SignalRepo {
    /// Create a new signal repository
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Record that a signal was delivered to a user
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn record(&self, user_id: &str, signal: &str, sent_at: &DateTime<Utc>) -> Result<()> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        conn.execute(
            "INSERT INTO proactive_signals (user_id, signal, sent_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![user_id, signal, format_timestamp(sent_at)],
        )?;
        Ok(())
    }

    /// When a signal was last delivered to a user
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn last_sent(&self, user_id: &str, signal: &str) -> Result<Option<DateTime<Utc>>> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        let last: Option<String> = conn.query_row(
            "SELECT MAX(sent_at) FROM proactive_signals WHERE user_id = ?1 AND signal = ?2",
            [user_id, signal],
            |row| row.get(0),
        )?;

        Ok(parse_optional_timestamp(last.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn last_sent_tracks_latest_per_signal() {
        let repo = SignalRepo::new(db::init_memory().unwrap());
        let now = Utc::now();

        assert!(repo.last_sent("u1", "habit_due").unwrap().is_none());

        repo.record("u1", "habit_due", &(now - chrono::Duration::hours(3))).unwrap();
        repo.record("u1", "habit_due", &now).unwrap();
        repo.record("u1", "urgent_email", &(now - chrono::Duration::hours(1))).unwrap();

        let last = repo.last_sent("u1", "habit_due").unwrap().unwrap();
        assert_eq!(last.timestamp_micros(), now.timestamp_micros());
        assert!(repo.last_sent("u2", "habit_due").unwrap().is_none());
    }
}
