//! Habit engine
//!
//! Mines a user's memory window for recurring patterns, merges them into
//! stored habits and closes the loop when a habit is executed.

mod detect;
mod pattern;
mod predict;
mod timeparse;

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

pub use detect::{
    MIN_CONTEXT_OCCURRENCES, MIN_FREQUENCY_CONSISTENCY, MIN_FREQUENCY_OCCURRENCES,
    MIN_SEQUENCE_OCCURRENCES, MIN_TIME_OCCURRENCES, circular_mean_time, detect_context_patterns,
    detect_frequency_patterns, detect_habits, detect_sequence_patterns, detect_time_patterns,
};
pub use pattern::{
    ContextPattern, DetectedHabit, FrequencyPattern, MergeKey, PatternData, PatternType,
    SequencePattern, TimePattern,
};
pub use predict::next_occurrence;
pub use timeparse::{ExtractedTime, extract_time_of_day};

use crate::Result;
use crate::config::HabitConfig;
use crate::db::{DbPool, Habit, HabitRepo, MemoryType};
use crate::memory::{MemoryStore, NewMemory};

/// Confidence gained per execution
const EXECUTION_CONFIDENCE_STEP: f64 = 0.05;

/// Ceiling for confidence reached through executions
const EXECUTION_CONFIDENCE_CAP: f64 = 0.95;

/// Importance of the memory recorded on execution
const EXECUTED_MEMORY_IMPORTANCE: f64 = 0.3;

/// Outcome of one analysis run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisReport {
    pub memories_scanned: usize,
    pub created: usize,
    pub updated: usize,
}

/// Habit service
#[derive(Debug, Clone)]
pub struct HabitEngine {
    habits: HabitRepo,
    memories: MemoryStore,
    config: HabitConfig,
}

impl HabitEngine {
    #[must_use]
    pub const fn new(pool: DbPool, memories: MemoryStore, config: HabitConfig) -> Self {
        Self {
            habits: HabitRepo::new(pool),
            memories,
            config,
        }
    }

    /// Run every detector over the user's window and merge the results
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn analyze(&self, user_id: &str) -> Result<AnalysisReport> {
        let window = self
            .memories
            .window(user_id, self.config.lookback_days, self.config.window_limit)?;

        let mut report = AnalysisReport {
            memories_scanned: window.len(),
            ..AnalysisReport::default()
        };

        for (key, detected) in self.strongest_by_key(detect_habits(&window)) {
            if self.merge(user_id, &key, detected)? {
                report.created += 1;
            } else {
                report.updated += 1;
            }
        }

        tracing::info!(
            user_id = %user_id,
            memories = report.memories_scanned,
            created = report.created,
            updated = report.updated,
            "habit analysis complete"
        );
        Ok(report)
    }

    /// Active habits, most confident first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list(&self, user_id: &str) -> Result<Vec<Habit>> {
        self.habits.list_active(user_id)
    }

    /// A single habit owned by the user
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get(&self, user_id: &str, habit_id: &str) -> Result<Option<Habit>> {
        self.habits.get(user_id, habit_id)
    }

    /// Whether a periodic analysis last run at `last_run` is due again
    #[must_use]
    pub fn analysis_due(&self, last_run: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        let interval =
            Duration::from_std(self.config.analysis_interval).unwrap_or_else(|_| Duration::hours(6));
        last_run.is_none_or(|last| now - last >= interval)
    }

    /// Active habits predicted for the current UTC day
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn habits_for_today(&self, user_id: &str) -> Result<Vec<Habit>> {
        let today = Utc::now().date_naive();
        Ok(self
            .list(user_id)?
            .into_iter()
            .filter(|h| h.next_predicted.is_some_and(|t| t.date_naive() == today))
            .collect())
    }

    /// Record that the user carried out a habit
    ///
    /// Returns false if the habit does not exist for this user.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub async fn mark_executed(&self, user_id: &str, habit_id: &str) -> Result<bool> {
        let Some(mut habit) = self.habits.get(user_id, habit_id)? else {
            return Ok(false);
        };

        let now = Utc::now();
        habit.observation_count = habit.observation_count.saturating_add(1);
        habit.confidence = habit
            .confidence
            .max((habit.confidence + EXECUTION_CONFIDENCE_STEP).min(EXECUTION_CONFIDENCE_CAP));
        habit.last_observed = Some(now);
        habit.next_predicted = next_occurrence(&habit.pattern, habit.last_observed);

        if !self.habits.update(&habit)? {
            return Ok(false);
        }

        self.memories
            .store(
                NewMemory::new(
                    user_id,
                    MemoryType::HabitExecuted,
                    format!("Executed habit: {}", habit.action()),
                )
                .with_importance(EXECUTED_MEMORY_IMPORTANCE)
                .without_reminder(),
            )
            .await?;

        tracing::debug!(
            user_id = %user_id,
            habit_id = %habit_id,
            confidence = habit.confidence,
            "habit executed"
        );
        Ok(true)
    }

    fn strongest_by_key(&self, detected: Vec<DetectedHabit>) -> BTreeMap<String, DetectedHabit> {
        let mut strongest: BTreeMap<String, DetectedHabit> = BTreeMap::new();
        for habit in detected {
            let key = self.config.merge_key.key_for(&habit.pattern);
            match strongest.get(&key) {
                Some(existing) if existing.confidence >= habit.confidence => {}
                _ => {
                    strongest.insert(key, habit);
                }
            }
        }
        strongest
    }

    /// Returns true if a new habit was created
    fn merge(&self, user_id: &str, key: &str, detected: DetectedHabit) -> Result<bool> {
        let now = Utc::now();

        if let Some(mut habit) = self.habits.find_by_key(user_id, key)? {
            let observed = u32::try_from(detected.pattern.occurrences()).unwrap_or(u32::MAX);
            habit.observation_count = habit.observation_count.max(observed);
            habit.confidence = habit.confidence.max(detected.confidence);
            habit.pattern = detected.pattern;
            habit.last_observed = Some(now);
            habit.next_predicted = next_occurrence(&habit.pattern, habit.last_observed);
            habit.active = true;
            self.habits.update(&habit)?;
            return Ok(false);
        }

        let mut habit = Habit::new(user_id, key, detected.pattern, detected.confidence);
        habit.last_observed = Some(now);
        habit.next_predicted = next_occurrence(&habit.pattern, habit.last_observed);
        self.habits.insert(&habit)?;

        tracing::debug!(user_id = %user_id, pattern_key = %key, "new habit detected");
        Ok(true)
    }
}
