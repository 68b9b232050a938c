//! Calendar conflict detection

use chrono::{DateTime, Utc};

use super::sources::CalendarEvent;

/// Two events whose times overlap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub earlier: CalendarEvent,
    pub later: CalendarEvent,
}

impl Conflict {
    /// "A vs B"
    #[must_use]
    pub fn title(&self) -> String {
        format!("{} vs {}", self.earlier.title, self.later.title)
    }

    /// When the overlap begins
    #[must_use]
    pub const fn starts_at(&self) -> DateTime<Utc> {
        self.later.start
    }
}

/// Adjacent-pair overlap check over events sorted by start time
///
/// A pair conflicts when the earlier event ends after the later one starts.
/// Events touching end-to-start do not conflict.
#[must_use]
pub fn detect_conflicts(events: &[CalendarEvent]) -> Vec<Conflict> {
    let mut sorted: Vec<&CalendarEvent> = events.iter().collect();
    sorted.sort_by_key(|e| e.start);

    sorted
        .windows(2)
        .filter(|pair| pair[0].end > pair[1].start)
        .map(|pair| Conflict {
            earlier: pair[0].clone(),
            later: pair[1].clone(),
        })
        .collect()
}
