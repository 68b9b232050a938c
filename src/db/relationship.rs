//! Relationship graph between memories

use chrono::{DateTime, Utc};

use super::{DbPool, format_timestamp, parse_timestamp};
use crate::{Error, Result};

/// Relationship type recorded when a memory is stored with related ids
pub const RELATED_TO: &str = "related_to";

/// An edge between two memories
#[derive(Debug, Clone)]
pub struct Relationship {
    pub user_id: String,
    pub source_id: String,
    pub target_id: String,
    pub relationship_type: String,
    pub strength: f64,
    pub context: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Relationship repository
#[derive(Debug, Clone)]
pub struct RelationshipRepo {
    pool: DbPool,
}

impl RelationshipRepo {
    /// Create a new relationship repository
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Record an edge; returns false if it already existed
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn add(&self, edge: &Relationship) -> Result<bool> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        let inserted = conn.execute(
            r"INSERT OR IGNORE INTO memory_relationships
              (user_id, source_id, target_id, relationship_type, strength, context, created_at)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                edge.user_id,
                edge.source_id,
                edge.target_id,
                edge.relationship_type,
                edge.strength,
                edge.context.to_string(),
                format_timestamp(&edge.created_at),
            ],
        )?;

        Ok(inserted > 0)
    }

    /// Edges touching a memory in either direction, strongest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn edges_for(&self, user_id: &str, memory_id: &str, limit: usize) -> Result<Vec<Relationship>> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn.prepare(
            r"SELECT user_id, source_id, target_id, relationship_type, strength, context, created_at
              FROM memory_relationships
              WHERE user_id = ?1 AND (source_id = ?2 OR target_id = ?2)
              ORDER BY strength DESC, created_at DESC
              LIMIT ?3",
        )?;

        #[allow(clippy::cast_possible_wrap)]
        let limit = limit as i64;
        let rows = stmt.query_map(rusqlite::params![user_id, memory_id, limit], |row| {
            let context: String = row.get(5)?;
            let created_at: String = row.get(6)?;
            Ok(Relationship {
                user_id: row.get(0)?,
                source_id: row.get(1)?,
                target_id: row.get(2)?,
                relationship_type: row.get(3)?,
                strength: row.get(4)?,
                context: serde_json::from_str(&context).unwrap_or_default(),
                created_at: parse_timestamp(&created_at),
            })
        })?;

        Ok(rows.flatten().collect())
    }

    /// Number of edges owned by a user
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn count_for_user(&self, user_id: &str) -> Result<usize> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM memory_relationships WHERE user_id = ?1",
            [user_id],
            |row| row.get(0),
        )?;

        Ok(usize::try_from(count).unwrap_or(0))
    }
}

impl Relationship {
    /// The memory on the other end of this edge
    #[must_use]
    pub fn other_end(&self, memory_id: &str) -> &str {
        if self.source_id == memory_id {
            &self.target_id
        } else {
            &self.source_id
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn edge(source: &str, target: &str, strength: f64) -> Relationship {
        Relationship {
            user_id: "u1".to_string(),
            source_id: source.to_string(),
            target_id: target.to_string(),
            relationship_type: RELATED_TO.to_string(),
            strength,
            context: serde_json::json!({ "source": "memory_creation" }),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn duplicate_edges_are_ignored() {
        let repo = RelationshipRepo::new(db::init_memory().unwrap());
        assert!(repo.add(&edge("a", "b", 0.8)).unwrap());
        assert!(!repo.add(&edge("a", "b", 0.8)).unwrap());
        assert_eq!(repo.count_for_user("u1").unwrap(), 1);
    }

    #[test]
    fn edges_are_found_from_both_ends() {
        let repo = RelationshipRepo::new(db::init_memory().unwrap());
        repo.add(&edge("a", "b", 0.5)).unwrap();
        repo.add(&edge("c", "a", 0.9)).unwrap();

        let edges = repo.edges_for("u1", "a", 10).unwrap();
        let others: Vec<&str> = edges.iter().map(|e| e.other_end("a")).collect();
        assert_eq!(others, vec!["c", "b"]);
    }
}
