//! Database schema and migrations

use rusqlite::Connection;

use crate::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 3;

/// Initialize the database schema
///
/// # Errors
///
/// Returns error if migration fails
pub fn init(conn: &Connection) -> Result<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }
    if version < 3 {
        migrate_v3(conn)?;
    }

    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Users reachable over SMS
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            phone_number TEXT NOT NULL UNIQUE,
            name TEXT,
            active INTEGER NOT NULL DEFAULT 1,
            preferences TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        -- Long-term memories
        CREATE TABLE IF NOT EXISTS memories (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            memory_type TEXT NOT NULL,
            content TEXT NOT NULL,
            embedding BLOB,
            context_data TEXT NOT NULL DEFAULT '{}',
            related_ids TEXT NOT NULL DEFAULT '[]',
            importance REAL NOT NULL DEFAULT 0.5,
            state TEXT NOT NULL DEFAULT 'active',
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_memories_user_state ON memories(user_id, state, created_at);
        CREATE INDEX IF NOT EXISTS idx_memories_user_type ON memories(user_id, memory_type);

        -- Relationship graph between memories
        CREATE TABLE IF NOT EXISTS memory_relationships (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            source_id TEXT NOT NULL,
            target_id TEXT NOT NULL,
            relationship_type TEXT NOT NULL,
            strength REAL NOT NULL,
            context TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            UNIQUE(source_id, target_id, relationship_type)
        );

        CREATE INDEX IF NOT EXISTS idx_relationships_source ON memory_relationships(source_id);
        CREATE INDEX IF NOT EXISTS idx_relationships_target ON memory_relationships(target_id);

        PRAGMA user_version = 1;
        ",
    )?;

    tracing::info!("migrated to schema v1");
    Ok(())
}

fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Detected habits
        CREATE TABLE IF NOT EXISTS habits (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            pattern_type TEXT NOT NULL,
            pattern_key TEXT NOT NULL,
            pattern_data TEXT NOT NULL,
            confidence REAL NOT NULL,
            observation_count INTEGER NOT NULL DEFAULT 0,
            last_observed TEXT,
            next_predicted TEXT,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(user_id, pattern_key)
        );

        CREATE INDEX IF NOT EXISTS idx_habits_user ON habits(user_id, active);

        PRAGMA user_version = 2;
        ",
    )?;

    tracing::info!("migrated to schema v2");
    Ok(())
}

fn migrate_v3(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Pending proactive work (memory reminders, wake-up calls)
        CREATE TABLE IF NOT EXISTS proactive_tasks (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            task_kind TEXT NOT NULL,
            scheduled_for TEXT NOT NULL,
            priority TEXT NOT NULL DEFAULT 'medium',
            payload TEXT NOT NULL DEFAULT '{}',
            status TEXT NOT NULL DEFAULT 'pending',
            retry_count INTEGER NOT NULL DEFAULT 0,
            max_retries INTEGER NOT NULL DEFAULT 3,
            last_error TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_tasks_due ON proactive_tasks(status, scheduled_for);

        -- Ledger of delivered proactive signals, used for dedup
        CREATE TABLE IF NOT EXISTS proactive_signals (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            signal TEXT NOT NULL,
            sent_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_signals_user ON proactive_signals(user_id, signal, sent_at);

        PRAGMA user_version = 3;
        ",
    )?;

    tracing::info!("migrated to schema v3");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init(&conn).unwrap();
        init(&conn).unwrap();

        let version: i32 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }
}
