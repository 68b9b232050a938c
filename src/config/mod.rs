//! Configuration management
//!
//! Values are layered: built-in defaults, then the TOML file, then
//! environment variables.

pub mod file;

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;

use crate::habits::MergeKey;
use crate::proactive::DedupPolicy;
use crate::{Error, Result};

use file::PlutoConfigFile;

/// Pluto configuration
#[derive(Debug)]
pub struct Config {
    /// `SQLite` database path
    pub db_path: PathBuf,

    /// `OpenAI` key for embeddings; semantic recall is disabled without it
    pub openai_api_key: Option<SecretString>,

    /// Embedding model override
    pub embedding_model: Option<String>,

    /// Twilio credentials; messages are only logged without them
    pub twilio: Option<TwilioConfig>,

    pub memory: MemoryConfig,
    pub habits: HabitConfig,
    pub proactive: ProactiveConfig,
    pub context: ContextConfig,
}

/// Twilio account used for SMS and voice
#[derive(Debug)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: SecretString,
    pub from_number: String,
    /// Outbound request budget
    pub messages_per_minute: u32,
}

/// Memory store configuration
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Entries kept per user in the recent-context buffer
    pub recent_max_entries: usize,
    /// Lifetime of a recent-context entry
    pub recent_ttl: Duration,
    /// Embedded candidates scored per semantic recall
    pub semantic_pool: usize,
    /// Characters kept in recent-context summaries
    pub summary_chars: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            recent_max_entries: 50,
            recent_ttl: Duration::from_secs(86_400),
            semantic_pool: 100,
            summary_chars: 200,
        }
    }
}

/// Habit detection configuration
#[derive(Debug, Clone)]
pub struct HabitConfig {
    pub lookback_days: i64,
    /// Memories scanned per analysis
    pub window_limit: usize,
    /// Time between scheduled analyses of one user
    pub analysis_interval: Duration,
    pub merge_key: MergeKey,
}

impl Default for HabitConfig {
    fn default() -> Self {
        Self {
            lookback_days: 30,
            window_limit: 1000,
            analysis_interval: Duration::from_secs(6 * 3600),
            merge_key: MergeKey::default(),
        }
    }
}

/// Proactive scheduler configuration
#[derive(Debug, Clone)]
pub struct ProactiveConfig {
    pub cycle_interval: Duration,
    /// Delay before the next cycle after a failed one
    pub retry_interval: Duration,
    pub suggestion_limit: usize,
    /// Hours ahead a habit counts as due soon
    pub due_soon_hours: f64,
    /// Minimum confidence for a habit check message
    pub habit_threshold: f64,
    pub dedup: DedupPolicy,
    pub max_concurrent_users: usize,
    /// Due tasks handled per cycle
    pub task_batch: usize,
    /// How long after its time a digest may still go out
    pub digest_window: Duration,
}

impl Default for ProactiveConfig {
    fn default() -> Self {
        Self {
            cycle_interval: Duration::from_secs(300),
            retry_interval: Duration::from_secs(60),
            suggestion_limit: 10,
            due_soon_hours: crate::proactive::DEFAULT_DUE_WINDOW_HOURS,
            habit_threshold: 0.6,
            dedup: DedupPolicy::default(),
            max_concurrent_users: 1,
            task_batch: 50,
            digest_window: Duration::from_secs(2 * 3600),
        }
    }
}

/// Context aggregator configuration
#[derive(Debug, Clone)]
pub struct ContextConfig {
    pub cache_ttl: Duration,
    /// Users with a cached context
    pub cache_capacity: u64,
    pub upcoming_reminder_hours: i64,
    pub calendar_lookahead_hours: i64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
            cache_capacity: 1024,
            upcoming_reminder_hours: 6,
            calendar_lookahead_hours: 24,
        }
    }
}

impl Config {
    /// Load configuration from the TOML file and environment
    ///
    /// With `path`, that file must exist and parse. Without it the standard
    /// location is tried and a bad file falls back to defaults.
    ///
    /// # Errors
    ///
    /// Returns error if an explicit config file is unusable or a value is invalid
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => file::read_config_file(path)?,
            None => file::load_config_file(),
        };
        Self::from_sources(file, |key| std::env::var(key).ok())
    }

    /// Merge a parsed file with environment lookups
    ///
    /// # Errors
    ///
    /// Returns error if a value is invalid
    pub fn from_sources(
        file: PlutoConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let db_path = env("PLUTO_DB_PATH")
            .or(file.db_path)
            .map_or_else(default_db_path, PathBuf::from);

        let openai_api_key = env("OPENAI_API_KEY")
            .or(file.api_keys.openai)
            .filter(|k| !k.is_empty())
            .map(SecretString::from);
        let embedding_model = env("PLUTO_EMBEDDING_MODEL").or(file.api_keys.embedding_model);

        let twilio = match (
            env("TWILIO_ACCOUNT_SID").or(file.twilio.account_sid),
            env("TWILIO_AUTH_TOKEN").or(file.twilio.auth_token),
            env("TWILIO_FROM_NUMBER").or(file.twilio.from_number),
        ) {
            (Some(account_sid), Some(auth_token), Some(from_number)) => Some(TwilioConfig {
                account_sid,
                auth_token: SecretString::from(auth_token),
                from_number,
                messages_per_minute: file.twilio.messages_per_minute.unwrap_or(60),
            }),
            (None, None, None) => None,
            _ => {
                tracing::warn!("incomplete Twilio credentials, messages will only be logged");
                None
            }
        };

        let m = file.memory;
        let memory_defaults = MemoryConfig::default();
        let memory = MemoryConfig {
            recent_max_entries: m
                .recent_max_entries
                .unwrap_or(memory_defaults.recent_max_entries),
            recent_ttl: m
                .recent_ttl_secs
                .map_or(memory_defaults.recent_ttl, Duration::from_secs),
            semantic_pool: m.semantic_pool.unwrap_or(memory_defaults.semantic_pool),
            summary_chars: m.summary_chars.unwrap_or(memory_defaults.summary_chars),
        };

        let h = file.habits;
        let habit_defaults = HabitConfig::default();
        let merge_key = match h.merge_key.as_deref() {
            None => habit_defaults.merge_key,
            Some(s) => MergeKey::from_str_value(s)
                .ok_or_else(|| Error::Config(format!("unknown habits.merge_key: {s}")))?,
        };
        let habits = HabitConfig {
            lookback_days: h.lookback_days.unwrap_or(habit_defaults.lookback_days),
            window_limit: h.window_limit.unwrap_or(habit_defaults.window_limit),
            analysis_interval: h
                .analysis_interval_secs
                .map_or(habit_defaults.analysis_interval, Duration::from_secs),
            merge_key,
        };

        let p = file.proactive;
        let proactive_defaults = ProactiveConfig::default();
        let cycle_secs = match env("PLUTO_CYCLE_INTERVAL_SECS") {
            Some(raw) => Some(raw.parse::<u64>().map_err(|_| {
                Error::Config(format!("PLUTO_CYCLE_INTERVAL_SECS is not a number: {raw}"))
            })?),
            None => p.cycle_interval_secs,
        };
        let dedup = match env("PLUTO_DEDUP").or(p.dedup) {
            None => proactive_defaults.dedup,
            Some(s) => DedupPolicy::parse(&s)
                .ok_or_else(|| Error::Config(format!("unknown dedup policy: {s}")))?,
        };
        let proactive = ProactiveConfig {
            cycle_interval: cycle_secs
                .filter(|s| *s > 0)
                .map_or(proactive_defaults.cycle_interval, Duration::from_secs),
            retry_interval: p
                .retry_interval_secs
                .map_or(proactive_defaults.retry_interval, Duration::from_secs),
            suggestion_limit: p
                .suggestion_limit
                .unwrap_or(proactive_defaults.suggestion_limit),
            due_soon_hours: p.due_soon_hours.unwrap_or(proactive_defaults.due_soon_hours),
            habit_threshold: p
                .habit_threshold
                .unwrap_or(proactive_defaults.habit_threshold),
            dedup,
            max_concurrent_users: p
                .max_concurrent_users
                .unwrap_or(proactive_defaults.max_concurrent_users)
                .max(1),
            task_batch: p.task_batch.unwrap_or(proactive_defaults.task_batch),
            digest_window: p
                .digest_window_secs
                .map_or(proactive_defaults.digest_window, Duration::from_secs),
        };

        let c = file.context;
        let context_defaults = ContextConfig::default();
        let context = ContextConfig {
            cache_ttl: c
                .cache_ttl_secs
                .map_or(context_defaults.cache_ttl, Duration::from_secs),
            cache_capacity: c.cache_capacity.unwrap_or(context_defaults.cache_capacity),
            upcoming_reminder_hours: c
                .upcoming_reminder_hours
                .unwrap_or(context_defaults.upcoming_reminder_hours),
            calendar_lookahead_hours: c
                .calendar_lookahead_hours
                .unwrap_or(context_defaults.calendar_lookahead_hours),
        };

        Ok(Self {
            db_path,
            openai_api_key,
            embedding_model,
            twilio,
            memory,
            habits,
            proactive,
            context,
        })
    }
}

/// `<data_dir>/pluto/pluto.db`
fn default_db_path() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from("pluto.db"),
        |d| d.data_dir().join("pluto").join("pluto.db"),
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_sources() {
        let config = Config::from_sources(PlutoConfigFile::default(), env(&[])).unwrap();

        assert!(config.openai_api_key.is_none());
        assert!(config.twilio.is_none());
        assert_eq!(config.memory.recent_max_entries, 50);
        assert_eq!(config.habits.lookback_days, 30);
        assert_eq!(config.habits.merge_key, MergeKey::PatternType);
        assert_eq!(config.proactive.cycle_interval, Duration::from_secs(300));
        assert_eq!(config.proactive.dedup, DedupPolicy::None);
        assert_eq!(config.context.cache_ttl, Duration::from_secs(300));
        assert!(config.db_path.ends_with("pluto.db"));
    }

    #[test]
    fn env_overrides_file() {
        let file: PlutoConfigFile = toml::from_str(
            r#"
            db_path = "/from/file.db"
            [proactive]
            cycle_interval_secs = 120
            "#,
        )
        .unwrap();

        let config = Config::from_sources(
            file,
            env(&[
                ("PLUTO_DB_PATH", "/from/env.db"),
                ("PLUTO_DEDUP", "cooldown:30"),
                ("OPENAI_API_KEY", "sk-test"),
            ]),
        )
        .unwrap();

        assert_eq!(config.db_path, PathBuf::from("/from/env.db"));
        assert_eq!(config.proactive.cycle_interval, Duration::from_secs(120));
        assert_eq!(
            config.proactive.dedup,
            DedupPolicy::Cooldown(chrono::Duration::minutes(30))
        );
        assert_eq!(
            config.openai_api_key.as_ref().map(|k| k.expose_secret()),
            Some("sk-test")
        );
    }

    #[test]
    fn twilio_needs_all_credentials() {
        let partial = Config::from_sources(
            PlutoConfigFile::default(),
            env(&[("TWILIO_ACCOUNT_SID", "AC1")]),
        )
        .unwrap();
        assert!(partial.twilio.is_none());

        let full = Config::from_sources(
            PlutoConfigFile::default(),
            env(&[
                ("TWILIO_ACCOUNT_SID", "AC1"),
                ("TWILIO_AUTH_TOKEN", "secret"),
                ("TWILIO_FROM_NUMBER", "+15550000"),
            ]),
        )
        .unwrap();
        let twilio = full.twilio.unwrap();
        assert_eq!(twilio.account_sid, "AC1");
        assert_eq!(twilio.messages_per_minute, 60);
        assert!(!format!("{twilio:?}").contains("secret"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let bad_dedup =
            Config::from_sources(PlutoConfigFile::default(), env(&[("PLUTO_DEDUP", "weekly")]));
        assert!(matches!(bad_dedup, Err(Error::Config(_))));

        let bad_interval = Config::from_sources(
            PlutoConfigFile::default(),
            env(&[("PLUTO_CYCLE_INTERVAL_SECS", "soon")]),
        );
        assert!(matches!(bad_interval, Err(Error::Config(_))));
    }
}
