//! Ranked proactive suggestions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::{PriorityAlert, UserContext};
use crate::db::Habit;
use crate::habits::PatternType;

/// Hours ahead a habit prediction counts as due soon
pub const DEFAULT_DUE_WINDOW_HOURS: f64 = 4.0;

/// Factor of the expected interval after which a habit counts as missed
const MISSED_FACTOR: f64 = 1.5;

/// Interval assumed for habits without one
const DEFAULT_FREQUENCY_HOURS: f64 = 24.0;

const ALERT_CONFIDENCE: f64 = 0.9;
const CONTEXT_CONFIDENCE: f64 = 0.8;

/// Message priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    #[must_use]
    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a suggestion was made
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuggestionKind {
    HabitDue { habit_id: String },
    HabitMissed { habit_id: String },
    UrgentAlert,
    EmailPriority,
    CalendarConflict,
}

impl SuggestionKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::HabitDue { .. } => "habit_due",
            Self::HabitMissed { .. } => "habit_missed",
            Self::UrgentAlert => "urgent_alert",
            Self::EmailPriority => "email_priority",
            Self::CalendarConflict => "calendar_conflict",
        }
    }

    /// Habit behind this suggestion, if any
    #[must_use]
    pub fn habit_id(&self) -> Option<&str> {
        match self {
            Self::HabitDue { habit_id } | Self::HabitMissed { habit_id } => Some(habit_id),
            _ => None,
        }
    }
}

/// A derived, unpersisted recommendation
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub kind: SuggestionKind,
    pub priority: Priority,
    pub message: String,
    pub confidence: f64,
    /// Hours until the habit is due
    pub hours_until: Option<f64>,
    /// Hours since the habit was last observed
    pub hours_since: Option<f64>,
}

/// Due-soon and missed suggestions for a set of habits
///
/// A habit predicted within `[0, due_window_hours]` from `now` is due soon.
/// A frequency habit with no upcoming prediction whose last observation is
/// older than 1.5 times its interval is missed.
#[must_use]
pub fn habit_suggestions(
    habits: &[Habit],
    now: DateTime<Utc>,
    due_window_hours: f64,
) -> Vec<Suggestion> {
    habits
        .iter()
        .filter(|h| h.active)
        .filter_map(|habit| {
            let upcoming = habit
                .next_predicted
                .map(|next| hours_between(now, next))
                .filter(|hours| *hours >= 0.0);

            match upcoming {
                Some(hours) if hours <= due_window_hours => Some(due_suggestion(habit, hours)),
                Some(_) => None,
                None => missed_suggestion(habit, now),
            }
        })
        .collect()
}

fn due_suggestion(habit: &Habit, hours: f64) -> Suggestion {
    let action = habit.action();
    let whole = hours.trunc();
    let (priority, message) = if hours <= 1.0 {
        (Priority::High, format!("Time for your {action} now!"))
    } else if hours <= 2.0 {
        (
            Priority::Medium,
            format!("Your {action} is due in {whole} hours"),
        )
    } else {
        (
            Priority::Low,
            format!("Your {action} is coming up in {whole} hours"),
        )
    };

    Suggestion {
        kind: SuggestionKind::HabitDue {
            habit_id: habit.id.clone(),
        },
        priority,
        message,
        confidence: habit.confidence,
        hours_until: Some(hours),
        hours_since: None,
    }
}

fn missed_suggestion(habit: &Habit, now: DateTime<Utc>) -> Option<Suggestion> {
    if habit.pattern_type() != PatternType::FrequencyBased {
        return None;
    }

    let expected = habit
        .pattern
        .frequency_hours()
        .filter(|h| *h > 0.0)
        .unwrap_or(DEFAULT_FREQUENCY_HOURS);
    let since = hours_between(habit.last_observed?, now);
    if since <= expected * MISSED_FACTOR {
        return None;
    }

    Some(Suggestion {
        kind: SuggestionKind::HabitMissed {
            habit_id: habit.id.clone(),
        },
        priority: Priority::Medium,
        message: format!(
            "You missed your {} ({} hours ago). Want to do it now?",
            habit.action(),
            since.trunc()
        ),
        confidence: habit.confidence,
        hours_until: None,
        hours_since: Some(since),
    })
}

/// Suggestions raised by the user's current context
#[must_use]
pub fn context_suggestions(context: &UserContext) -> Vec<Suggestion> {
    let mut suggestions: Vec<Suggestion> = context
        .alerts_at(Priority::High)
        .map(alert_suggestion)
        .collect();

    if context.email.urgent_count > 0 {
        suggestions.push(Suggestion {
            kind: SuggestionKind::EmailPriority,
            priority: Priority::High,
            message: format!(
                "You have {} urgent emails. Want me to summarize them?",
                context.email.urgent_count
            ),
            confidence: CONTEXT_CONFIDENCE,
            hours_until: None,
            hours_since: None,
        });
    }

    if context.calendar.conflict_count > 0 {
        suggestions.push(Suggestion {
            kind: SuggestionKind::CalendarConflict,
            priority: Priority::High,
            message: "Calendar conflict detected! Want me to help resolve it?".to_string(),
            confidence: CONTEXT_CONFIDENCE,
            hours_until: None,
            hours_since: None,
        });
    }

    suggestions
}

fn alert_suggestion(alert: &PriorityAlert) -> Suggestion {
    Suggestion {
        kind: SuggestionKind::UrgentAlert,
        priority: alert.priority,
        message: alert.message.clone(),
        confidence: ALERT_CONFIDENCE,
        hours_until: None,
        hours_since: None,
    }
}

/// Sort by priority then confidence, highest first, and keep `limit`
#[must_use]
pub fn rank_suggestions(mut suggestions: Vec<Suggestion>, limit: usize) -> Vec<Suggestion> {
    suggestions.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| b.confidence.total_cmp(&a.confidence))
    });
    suggestions.truncate(limit);
    suggestions
}

#[allow(clippy::cast_precision_loss)]
fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_seconds() as f64 / 3600.0
}
