//! Cross-cycle deduplication of proactive signals

use chrono::{DateTime, Duration, Utc};

/// How often the same signal may reach a user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DedupPolicy {
    /// Re-evaluate every cycle; a signal that stays true fires every cycle
    #[default]
    None,
    /// At most once per UTC day
    Daily,
    /// At most once per window
    Cooldown(Duration),
}

impl DedupPolicy {
    /// Parse `none`, `daily` or `cooldown:<minutes>`
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "none" => Some(Self::None),
            "daily" => Some(Self::Daily),
            other => {
                let minutes: i64 = other.strip_prefix("cooldown:")?.trim().parse().ok()?;
                (minutes > 0).then(|| Self::Cooldown(Duration::minutes(minutes)))
            }
        }
    }

    /// Whether a signal last sent at `last_sent` may be sent again at `now`
    #[must_use]
    pub fn allows(self, last_sent: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        let Some(last) = last_sent else {
            return true;
        };

        match self {
            Self::None => true,
            Self::Daily => last.date_naive() != now.date_naive(),
            Self::Cooldown(window) => now - last >= window,
        }
    }
}
