//! Urgency analysis and reminder timing for stored memories

use std::sync::LazyLock;

use chrono::Duration;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::proactive::Priority;

static CRITICAL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(urgent|emergency|asap|immediately|now|critical|deadline|due today)\b")
        .expect("valid regex")
});

static HIGH_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(important|soon|today|this afternoon|this evening|priority)\b")
        .expect("valid regex")
});

static MEDIUM_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(tomorrow|this week|when you can|sometime)\b").expect("valid regex")
});

/// How soon a stored memory needs attention
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

impl Urgency {
    /// Hours before the first reminder, before phrase adjustments
    #[must_use]
    pub const fn base_delay_hours(self) -> i64 {
        match self {
            Self::Critical => 1,
            Self::High => 3,
            Self::Medium => 6,
            Self::Low => 12,
        }
    }

    #[must_use]
    pub const fn priority(self) -> Priority {
        match self {
            Self::Critical | Self::High => Priority::High,
            Self::Medium => Priority::Medium,
            Self::Low => Priority::Low,
        }
    }

    const fn emoji(self) -> &'static str {
        match self {
            Self::Critical => "🚨",
            Self::High => "⚠️",
            Self::Medium => "📝",
            Self::Low => "💡",
        }
    }
}

/// Classify content by urgency keywords, falling back to importance
#[must_use]
pub fn analyze_urgency(content: &str, importance: f64) -> Urgency {
    if CRITICAL_REGEX.is_match(content) {
        Urgency::Critical
    } else if HIGH_REGEX.is_match(content) {
        Urgency::High
    } else if MEDIUM_REGEX.is_match(content) {
        Urgency::Medium
    } else if importance >= 0.8 {
        Urgency::High
    } else if importance >= 0.5 {
        Urgency::Medium
    } else {
        Urgency::Low
    }
}

/// Delay before reminding about `content`
///
/// Explicit day phrases override the tier delay; meal and day-part words
/// shift it.
#[must_use]
pub fn reminder_delay(urgency: Urgency, content: &str) -> Duration {
    let lower = content.to_lowercase();
    let base = urgency.base_delay_hours();

    let hours = if lower.contains("next week") {
        168
    } else if lower.contains("tomorrow") {
        24
    } else if lower.contains("this afternoon") {
        4
    } else if lower.contains("tonight") {
        8
    } else if lower.contains("morning") || lower.contains("breakfast") {
        (base - 2).max(1)
    } else if lower.contains("evening") || lower.contains("dinner") {
        (base + 2).min(24)
    } else {
        base
    };

    Duration::hours(hours)
}

/// SMS body for a due memory reminder
#[must_use]
pub fn reminder_message(content: &str, urgency: Urgency) -> String {
    let mut message = format!("{} Reminder: {content}", urgency.emoji());
    match urgency {
        Urgency::Critical => {
            message.push_str("\n\nThis is marked as urgent - please address soon!");
        }
        Urgency::High => {
            message.push_str("\n\nThis is important - consider addressing today.");
        }
        Urgency::Medium | Urgency::Low => {}
    }
    message
}
