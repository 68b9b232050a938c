//! Habit detection passes over a user's memory window
//!
//! Each pass is independent: a family only yields habits once its
//! minimum-occurrence threshold is met, and content a pass cannot interpret
//! is skipped for that pass alone.

use std::collections::BTreeMap;
use std::f64::consts::TAU;

use chrono::{Datelike, NaiveTime, Timelike, Weekday};

use super::pattern::{
    ContextPattern, DetectedHabit, FrequencyPattern, PatternData, SequencePattern, TimePattern,
};
use super::timeparse::extract_time_of_day;
use crate::db::{Memory, MemoryType};

/// Minimum occurrences for a time-of-day habit
pub const MIN_TIME_OCCURRENCES: usize = 3;

/// Minimum occurrences for a frequency habit
pub const MIN_FREQUENCY_OCCURRENCES: usize = 5;

/// Minimum occurrences for a trigger/follow-up habit
pub const MIN_CONTEXT_OCCURRENCES: usize = 3;

/// Minimum occurrences for a sequence habit
pub const MIN_SEQUENCE_OCCURRENCES: usize = 2;

/// Consistency a frequency habit must exceed
pub const MIN_FREQUENCY_CONSISTENCY: f64 = 0.6;

/// Share of occurrences a weekday needs to count as part of a time habit
const WEEKDAY_SHARE: f64 = 0.3;

const SEQUENCE_LENGTHS: std::ops::RangeInclusive<usize> = 3..=5;

const MINUTES_PER_DAY: f64 = 1440.0;

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Run all four passes; `memories` must be in chronological order
#[must_use]
pub fn detect_habits(memories: &[Memory]) -> Vec<DetectedHabit> {
    let mut habits = detect_time_patterns(memories);
    habits.extend(detect_frequency_patterns(memories));
    habits.extend(detect_context_patterns(memories));
    habits.extend(detect_sequence_patterns(memories));
    habits
}

/// Same type at the same time of day
#[must_use]
pub fn detect_time_patterns(memories: &[Memory]) -> Vec<DetectedHabit> {
    let mut groups: BTreeMap<(String, String), Vec<(&Memory, NaiveTime)>> = BTreeMap::new();

    for memory in memories.iter().filter(|m| carries_time_of_day(&m.memory_type)) {
        let Some(extracted) = extract_time_of_day(&memory.content) else {
            continue;
        };
        groups
            .entry((memory.memory_type.to_string(), extracted.label))
            .or_default()
            .push((memory, extracted.time));
    }

    groups
        .into_iter()
        .filter(|(_, group)| group.len() >= MIN_TIME_OCCURRENCES)
        .map(|((memory_type, time_label), group)| {
            let times: Vec<NaiveTime> = group.iter().map(|(_, t)| *t).collect();
            let avg_time = circular_mean_time(&times);
            let weekdays = frequent_weekdays(group.iter().map(|(m, _)| m.created_at.weekday()));
            let occurrences = group.len();

            DetectedHabit {
                confidence: (count_f64(occurrences) / 10.0).min(0.9),
                pattern: PatternData::TimeBased(TimePattern {
                    memory_type,
                    time_label,
                    action: format!("activity at {}", avg_time.format("%H:%M")),
                    avg_time,
                    weekdays,
                    occurrences,
                }),
            }
        })
        .collect()
}

/// Same type at a steady interval
#[must_use]
pub fn detect_frequency_patterns(memories: &[Memory]) -> Vec<DetectedHabit> {
    let mut groups: BTreeMap<String, Vec<&Memory>> = BTreeMap::new();
    for memory in memories {
        groups
            .entry(memory.memory_type.to_string())
            .or_default()
            .push(memory);
    }

    groups
        .into_iter()
        .filter(|(_, group)| group.len() >= MIN_FREQUENCY_OCCURRENCES)
        .filter_map(|(memory_type, mut group)| {
            group.sort_by_key(|m| m.created_at);
            let intervals: Vec<f64> = group
                .windows(2)
                .map(|pair| minutes_between(pair[0], pair[1]) / 60.0)
                .collect();

            let (mean, stdev) = mean_and_stdev(&intervals)?;
            if mean <= 0.0 {
                return None;
            }
            let consistency = (1.0 - stdev / mean).clamp(0.0, 1.0);
            if consistency <= MIN_FREQUENCY_CONSISTENCY {
                return None;
            }

            Some(DetectedHabit {
                confidence: consistency.min(0.8),
                pattern: PatternData::FrequencyBased(FrequencyPattern {
                    action: format!("check {memory_type}"),
                    memory_type,
                    frequency_hours: (mean * 10.0).round() / 10.0,
                    consistency,
                    occurrences: group.len(),
                }),
            })
        })
        .collect()
}

/// One type reliably followed by another
#[must_use]
pub fn detect_context_patterns(memories: &[Memory]) -> Vec<DetectedHabit> {
    let mut groups: BTreeMap<(String, String), Vec<f64>> = BTreeMap::new();

    for pair in memories.windows(2) {
        let (trigger, follow_up) = (&pair[0], &pair[1]);
        if trigger.memory_type == follow_up.memory_type {
            continue;
        }
        groups
            .entry((trigger.memory_type.to_string(), follow_up.memory_type.to_string()))
            .or_default()
            .push(minutes_between(trigger, follow_up));
    }

    groups
        .into_iter()
        .filter(|(_, gaps)| gaps.len() >= MIN_CONTEXT_OCCURRENCES)
        .map(|((trigger, follow_up), gaps)| {
            let occurrences = gaps.len();
            DetectedHabit {
                confidence: (count_f64(occurrences) / 8.0).min(0.7),
                pattern: PatternData::ContextBased(ContextPattern {
                    action: format!("after {trigger}, do {follow_up}"),
                    trigger,
                    follow_up,
                    avg_gap_minutes: gaps.iter().sum::<f64>() / count_f64(occurrences),
                    occurrences,
                }),
            }
        })
        .collect()
}

/// Repeated chains of three to five types
#[must_use]
pub fn detect_sequence_patterns(memories: &[Memory]) -> Vec<DetectedHabit> {
    let mut groups: BTreeMap<Vec<String>, Vec<f64>> = BTreeMap::new();

    for len in SEQUENCE_LENGTHS {
        for window in memories.windows(len) {
            let key: Vec<String> = window.iter().map(|m| m.memory_type.to_string()).collect();
            groups
                .entry(key)
                .or_default()
                .push(minutes_between(&window[0], &window[len - 1]));
        }
    }

    groups
        .into_iter()
        .filter(|(_, durations)| durations.len() >= MIN_SEQUENCE_OCCURRENCES)
        .map(|(sequence, durations)| {
            let occurrences = durations.len();
            DetectedHabit {
                confidence: (count_f64(occurrences) / 6.0).min(0.6),
                pattern: PatternData::SequenceBased(SequencePattern {
                    action: format!("follow sequence: {}", sequence.join(" -> ")),
                    sequence,
                    avg_duration_minutes: durations.iter().sum::<f64>() / count_f64(occurrences),
                    occurrences,
                }),
            }
        })
        .collect()
}

/// Memory types whose content is scanned for a time of day
const fn carries_time_of_day(memory_type: &MemoryType) -> bool {
    matches!(
        memory_type,
        MemoryType::Reminder | MemoryType::Schedule | MemoryType::Habit | MemoryType::Sms
    )
}

/// Mean time of day on the 24h circle, so 23:30 and 00:30 average to 00:00
#[must_use]
pub fn circular_mean_time(times: &[NaiveTime]) -> NaiveTime {
    let (sin_sum, cos_sum) = times.iter().fold((0.0_f64, 0.0_f64), |(s, c), t| {
        let minutes = f64::from(t.num_seconds_from_midnight()) / 60.0;
        let angle = minutes / MINUTES_PER_DAY * TAU;
        (s + angle.sin(), c + angle.cos())
    });

    let mut angle = sin_sum.atan2(cos_sum);
    if angle < 0.0 {
        angle += TAU;
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let minutes = ((angle / TAU * MINUTES_PER_DAY).round() as u32) % 1440;
    NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0).unwrap_or(NaiveTime::MIN)
}

fn frequent_weekdays(days: impl Iterator<Item = Weekday>) -> Vec<Weekday> {
    let mut counts = [0_usize; 7];
    let mut total = 0_usize;
    for day in days {
        counts[day.num_days_from_monday() as usize] += 1;
        total += 1;
    }

    let threshold = count_f64(total) * WEEKDAY_SHARE;
    counts
        .iter()
        .enumerate()
        .filter(|(_, count)| **count > 0 && count_f64(**count) >= threshold)
        .map(|(idx, _)| WEEK[idx])
        .collect()
}

fn minutes_between(earlier: &Memory, later: &Memory) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let seconds = (later.created_at - earlier.created_at).num_seconds() as f64;
    seconds / 60.0
}

/// Population mean and standard deviation; `None` for an empty slice
fn mean_and_stdev(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = count_f64(values.len());
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some((mean, variance.sqrt()))
}

#[allow(clippy::cast_precision_loss)]
fn count_f64(n: usize) -> f64 {
    n as f64
}
