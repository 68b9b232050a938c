//! Next-occurrence prediction

use chrono::{DateTime, Duration, Utc};

use super::pattern::PatternData;

/// Gap assumed for trigger/follow-up habits with no usable average
const DEFAULT_CONTEXT_GAP_MINUTES: f64 = 60.0;

/// Predict when a habit will next occur
///
/// Returns `None` until the habit has been observed.
#[must_use]
pub fn next_occurrence(
    pattern: &PatternData,
    last_observed: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    let last = last_observed?;

    match pattern {
        PatternData::TimeBased(p) => {
            let day = (last + Duration::days(1)).date_naive();
            Some(day.and_time(p.avg_time).and_utc())
        }
        PatternData::FrequencyBased(p) => Some(last + hours(p.frequency_hours)),
        PatternData::ContextBased(p) => {
            let gap = if p.avg_gap_minutes > 0.0 {
                p.avg_gap_minutes
            } else {
                DEFAULT_CONTEXT_GAP_MINUTES
            };
            Some(last + hours(gap / 60.0))
        }
        PatternData::SequenceBased(_) => Some(last + Duration::days(1)),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn hours(h: f64) -> Duration {
    Duration::seconds((h * 3600.0).round() as i64)
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveTime, TimeZone};

    use super::*;
    use crate::habits::pattern::{ContextPattern, FrequencyPattern, SequencePattern, TimePattern};

    fn last() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 21, 15, 0).unwrap()
    }

    #[test]
    fn time_habit_lands_next_day_at_average_time() {
        let pattern = PatternData::TimeBased(TimePattern {
            memory_type: "habit".to_string(),
            time_label: "07:00".to_string(),
            avg_time: NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            weekdays: Vec::new(),
            occurrences: 4,
            action: "activity at 07:00".to_string(),
        });

        assert_eq!(
            next_occurrence(&pattern, Some(last())),
            Some(Utc.with_ymd_and_hms(2024, 3, 5, 7, 0, 0).unwrap())
        );
    }

    #[test]
    fn frequency_habit_adds_interval() {
        let pattern = PatternData::FrequencyBased(FrequencyPattern {
            memory_type: "email_check".to_string(),
            frequency_hours: 2.5,
            consistency: 0.9,
            occurrences: 6,
            action: "check email_check".to_string(),
        });

        assert_eq!(
            next_occurrence(&pattern, Some(last())),
            Some(last() + Duration::minutes(150))
        );
    }

    #[test]
    fn context_habit_adds_gap_with_default() {
        let mut context = ContextPattern {
            trigger: "email".to_string(),
            follow_up: "call".to_string(),
            avg_gap_minutes: 15.0,
            occurrences: 3,
            action: "after email, do call".to_string(),
        };
        let pattern = PatternData::ContextBased(context.clone());
        assert_eq!(
            next_occurrence(&pattern, Some(last())),
            Some(last() + Duration::minutes(15))
        );

        context.avg_gap_minutes = 0.0;
        let pattern = PatternData::ContextBased(context);
        assert_eq!(
            next_occurrence(&pattern, Some(last())),
            Some(last() + Duration::minutes(60))
        );
    }

    #[test]
    fn sequence_habit_is_daily_and_unobserved_is_unknown() {
        let pattern = PatternData::SequenceBased(SequencePattern {
            sequence: vec!["email".to_string(), "sms".to_string(), "call".to_string()],
            avg_duration_minutes: 20.0,
            occurrences: 2,
            action: "follow sequence: email -> sms -> call".to_string(),
        });

        assert_eq!(
            next_occurrence(&pattern, Some(last())),
            Some(last() + Duration::days(1))
        );
        assert_eq!(next_occurrence(&pattern, None), None);
    }
}
