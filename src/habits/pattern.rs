//! Habit pattern families and their typed data

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// Pattern family a habit belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    /// Recurs at the same time of day
    TimeBased,
    /// Recurs at a steady interval
    FrequencyBased,
    /// One memory type reliably follows another
    ContextBased,
    /// A multi-step chain of memory types repeats
    SequenceBased,
}

impl PatternType {
    /// Stored string tag
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TimeBased => "time_based",
            Self::FrequencyBased => "frequency_based",
            Self::ContextBased => "context_based",
            Self::SequenceBased => "sequence_based",
        }
    }

    /// Parse a stored tag
    #[must_use]
    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "time_based" => Some(Self::TimeBased),
            "frequency_based" => Some(Self::FrequencyBased),
            "context_based" => Some(Self::ContextBased),
            "sequence_based" => Some(Self::SequenceBased),
            _ => None,
        }
    }
}

impl std::fmt::Display for PatternType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Same memory type at the same time of day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimePattern {
    pub memory_type: String,
    /// Normalized time label the group was keyed on ("07:00", "morning")
    pub time_label: String,
    /// Circular mean of the observed times
    pub avg_time: NaiveTime,
    /// Weekdays covering at least 30% of occurrences
    pub weekdays: Vec<Weekday>,
    pub occurrences: usize,
    pub action: String,
}

/// Same memory type at a steady interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyPattern {
    pub memory_type: String,
    pub frequency_hours: f64,
    /// `1 - stdev/mean` of the intervals, in `[0, 1]`
    pub consistency: f64,
    pub occurrences: usize,
    pub action: String,
}

/// A follow-up memory type that tends to come after a trigger type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextPattern {
    pub trigger: String,
    pub follow_up: String,
    pub avg_gap_minutes: f64,
    pub occurrences: usize,
    pub action: String,
}

/// A repeated chain of three to five memory types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencePattern {
    pub sequence: Vec<String>,
    pub avg_duration_minutes: f64,
    pub occurrences: usize,
    pub action: String,
}

/// Pattern data, one variant per family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "pattern_type", rename_all = "snake_case")]
pub enum PatternData {
    TimeBased(TimePattern),
    FrequencyBased(FrequencyPattern),
    ContextBased(ContextPattern),
    SequenceBased(SequencePattern),
}

impl PatternData {
    #[must_use]
    pub const fn pattern_type(&self) -> PatternType {
        match self {
            Self::TimeBased(_) => PatternType::TimeBased,
            Self::FrequencyBased(_) => PatternType::FrequencyBased,
            Self::ContextBased(_) => PatternType::ContextBased,
            Self::SequenceBased(_) => PatternType::SequenceBased,
        }
    }

    /// Human-readable action this habit stands for
    #[must_use]
    pub fn action(&self) -> &str {
        match self {
            Self::TimeBased(p) => &p.action,
            Self::FrequencyBased(p) => &p.action,
            Self::ContextBased(p) => &p.action,
            Self::SequenceBased(p) => &p.action,
        }
    }

    /// Number of observations backing the pattern
    #[must_use]
    pub const fn occurrences(&self) -> usize {
        match self {
            Self::TimeBased(p) => p.occurrences,
            Self::FrequencyBased(p) => p.occurrences,
            Self::ContextBased(p) => p.occurrences,
            Self::SequenceBased(p) => p.occurrences,
        }
    }

    /// Key of the group the detector built this pattern from
    #[must_use]
    pub fn group_key(&self) -> String {
        match self {
            Self::TimeBased(p) => format!("{}@{}", p.memory_type, p.time_label),
            Self::FrequencyBased(p) => p.memory_type.clone(),
            Self::ContextBased(p) => format!("{}>{}", p.trigger, p.follow_up),
            Self::SequenceBased(p) => p.sequence.join(">"),
        }
    }

    /// Expected hours between occurrences, if the pattern defines one
    #[must_use]
    pub const fn frequency_hours(&self) -> Option<f64> {
        match self {
            Self::FrequencyBased(p) => Some(p.frequency_hours),
            _ => None,
        }
    }

    /// One-line nudge for this habit
    #[must_use]
    pub fn nudge(&self) -> String {
        match self {
            Self::TimeBased(p) => format!("Time for your {}", p.action),
            Self::FrequencyBased(p) => format!("Check your {}", p.memory_type),
            Self::ContextBased(p) => {
                format!("After {}, remember to {}", p.trigger, p.follow_up)
            }
            Self::SequenceBased(p) => format!("Start your {}", p.action),
        }
    }
}

/// How detected habits are matched against stored ones
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeKey {
    /// One habit per user and pattern family
    #[default]
    PatternType,
    /// One habit per user, pattern family and detector group
    Pattern,
}

impl MergeKey {
    /// Storage key for a pattern under this policy
    #[must_use]
    pub fn key_for(self, pattern: &PatternData) -> String {
        match self {
            Self::PatternType => pattern.pattern_type().as_str().to_string(),
            Self::Pattern => format!("{}:{}", pattern.pattern_type(), pattern.group_key()),
        }
    }

    /// Parse a config value
    #[must_use]
    pub fn from_str_value(s: &str) -> Option<Self> {
        match s {
            "pattern_type" => Some(Self::PatternType),
            "pattern" => Some(Self::Pattern),
            _ => None,
        }
    }
}

/// Candidate habit produced by one detector pass
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedHabit {
    pub pattern: PatternData,
    pub confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frequency() -> PatternData {
        PatternData::FrequencyBased(FrequencyPattern {
            memory_type: "email_check".to_string(),
            frequency_hours: 2.0,
            consistency: 0.95,
            occurrences: 6,
            action: "check email_check".to_string(),
        })
    }

    #[test]
    fn pattern_data_is_tagged_by_family() {
        let json = serde_json::to_value(frequency()).unwrap();
        assert_eq!(json["pattern_type"], "frequency_based");
        assert_eq!(json["frequency_hours"], 2.0);

        let back: PatternData = serde_json::from_value(json).unwrap();
        assert_eq!(back, frequency());
    }

    #[test]
    fn merge_key_policies() {
        let pattern = frequency();
        assert_eq!(MergeKey::PatternType.key_for(&pattern), "frequency_based");
        assert_eq!(MergeKey::Pattern.key_for(&pattern), "frequency_based:email_check");
    }

    #[test]
    fn nudges_per_family() {
        assert_eq!(frequency().nudge(), "Check your email_check");

        let context = PatternData::ContextBased(ContextPattern {
            trigger: "email".to_string(),
            follow_up: "call".to_string(),
            avg_gap_minutes: 12.0,
            occurrences: 3,
            action: "after email, do call".to_string(),
        });
        assert_eq!(context.nudge(), "After email, remember to call");
        assert_eq!(context.group_key(), "email>call");
    }
}
