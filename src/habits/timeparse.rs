//! Time-of-day extraction from free text

use std::sync::LazyLock;

use chrono::NaiveTime;
use regex::Regex;

/// "7:30", "7:30pm", "19:05"
static CLOCK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2}):(\d{2})\s*(am|pm)?\b").expect("valid regex")
});

/// "7am", "7 pm"
static MERIDIEM_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2})\s*(am|pm)\b").expect("valid regex"));

/// "7 o'clock", "7 oclock"
static OCLOCK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2})\s*o'?clock\b").expect("valid regex"));

/// Day-part keywords and the clock hour they stand for
const DAY_PARTS: [(&str, u32); 4] = [
    ("morning", 8),
    ("afternoon", 14),
    ("evening", 18),
    ("night", 22),
];

/// A time of day found in memory content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedTime {
    pub time: NaiveTime,
    /// Group label: "HH:MM" for explicit times, the keyword for day parts
    pub label: String,
}

/// Extract the first time of day mentioned in `content`
///
/// Explicit times win over day-part keywords. Out-of-range values are ignored.
#[must_use]
pub fn extract_time_of_day(content: &str) -> Option<ExtractedTime> {
    explicit_time(content)
        .map(|time| ExtractedTime {
            time,
            label: time.format("%H:%M").to_string(),
        })
        .or_else(|| day_part(content))
}

fn explicit_time(content: &str) -> Option<NaiveTime> {
    if let Some(caps) = CLOCK_REGEX.captures(content) {
        let hour = caps[1].parse().ok();
        let minute = caps[2].parse().ok();
        let meridiem = caps.get(3).map(|m| m.as_str());
        if let Some(time) = hour.zip(minute).and_then(|(h, m)| to_time(h, m, meridiem)) {
            return Some(time);
        }
    }

    if let Some(caps) = MERIDIEM_REGEX.captures(content) {
        let meridiem = caps.get(2).map(|m| m.as_str());
        if let Some(time) = caps[1].parse().ok().and_then(|h| to_time(h, 0, meridiem)) {
            return Some(time);
        }
    }

    OCLOCK_REGEX
        .captures(content)
        .and_then(|caps| caps[1].parse().ok())
        .and_then(|h| to_time(h, 0, None))
}

fn to_time(hour: u32, minute: u32, meridiem: Option<&str>) -> Option<NaiveTime> {
    let hour = match meridiem.map(str::to_ascii_lowercase).as_deref() {
        Some("pm") if (1..=12).contains(&hour) => {
            if hour == 12 { 12 } else { hour + 12 }
        }
        Some("am") if (1..=12).contains(&hour) => {
            if hour == 12 { 0 } else { hour }
        }
        Some(_) => return None,
        None => hour,
    };

    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn day_part(content: &str) -> Option<ExtractedTime> {
    let lower = content.to_lowercase();
    DAY_PARTS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .and_then(|(keyword, hour)| {
            NaiveTime::from_hms_opt(*hour, 0, 0).map(|time| ExtractedTime {
                time,
                label: (*keyword).to_string(),
            })
        })
}
