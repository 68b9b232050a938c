//! TOML configuration file loading
//!
//! Supports `~/.config/pluto/config.toml` as a persistent config source.
//! Every field is optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlutoConfigFile {
    /// `SQLite` database path
    pub db_path: Option<String>,

    /// API keys and model names for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// Twilio SMS/voice credentials
    #[serde(default)]
    pub twilio: TwilioFileConfig,

    #[serde(default)]
    pub memory: MemoryFileConfig,

    #[serde(default)]
    pub habits: HabitsFileConfig,

    #[serde(default)]
    pub proactive: ProactiveFileConfig,

    #[serde(default)]
    pub context: ContextFileConfig,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    /// Embedding model (e.g. "text-embedding-3-small")
    pub embedding_model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TwilioFileConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub from_number: Option<String>,
    pub messages_per_minute: Option<u32>,
}

/// Memory store tuning
#[derive(Debug, Default, Deserialize)]
pub struct MemoryFileConfig {
    pub recent_max_entries: Option<usize>,
    pub recent_ttl_secs: Option<u64>,
    pub semantic_pool: Option<usize>,
    pub summary_chars: Option<usize>,
}

/// Habit detection tuning
#[derive(Debug, Default, Deserialize)]
pub struct HabitsFileConfig {
    pub lookback_days: Option<i64>,
    pub window_limit: Option<usize>,
    pub analysis_interval_secs: Option<u64>,
    /// `pattern_type` or `pattern`
    pub merge_key: Option<String>,
}

/// Proactive scheduler tuning
#[derive(Debug, Default, Deserialize)]
pub struct ProactiveFileConfig {
    pub cycle_interval_secs: Option<u64>,
    pub retry_interval_secs: Option<u64>,
    pub suggestion_limit: Option<usize>,
    pub due_soon_hours: Option<f64>,
    pub habit_threshold: Option<f64>,
    /// `none`, `daily` or `cooldown:<minutes>`
    pub dedup: Option<String>,
    pub max_concurrent_users: Option<usize>,
    pub task_batch: Option<usize>,
    pub digest_window_secs: Option<u64>,
}

/// Context aggregator tuning
#[derive(Debug, Default, Deserialize)]
pub struct ContextFileConfig {
    pub cache_ttl_secs: Option<u64>,
    pub cache_capacity: Option<u64>,
    pub upcoming_reminder_hours: Option<i64>,
    pub calendar_lookahead_hours: Option<i64>,
}

/// Read and parse a config file
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid TOML
pub fn read_config_file(path: &Path) -> Result<PlutoConfigFile> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
    Ok(toml::from_str(&content)?)
}

/// Load the TOML config file from the standard path
///
/// Returns `PlutoConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> PlutoConfigFile {
    let Some(path) = config_file_path() else {
        return PlutoConfigFile::default();
    };

    if !path.exists() {
        return PlutoConfigFile::default();
    }

    match read_config_file(&path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "loaded config file");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            PlutoConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/pluto/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("pluto").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn parses_partial_file() {
        let file: PlutoConfigFile = toml::from_str(
            r#"
            db_path = "/tmp/pluto.db"

            [proactive]
            cycle_interval_secs = 120
            dedup = "daily"

            [habits]
            merge_key = "pattern"
            "#,
        )
        .unwrap();

        assert_eq!(file.db_path.as_deref(), Some("/tmp/pluto.db"));
        assert_eq!(file.proactive.cycle_interval_secs, Some(120));
        assert_eq!(file.proactive.dedup.as_deref(), Some("daily"));
        assert_eq!(file.habits.merge_key.as_deref(), Some("pattern"));
        assert!(file.twilio.account_sid.is_none());
    }

    #[test]
    fn unreadable_or_invalid_file_is_error() {
        let missing = read_config_file(Path::new("/nonexistent/pluto/config.toml"));
        assert!(matches!(missing, Err(Error::Config(_))));

        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, "proactive = 3").unwrap();
        assert!(matches!(read_config_file(tmp.path()), Err(Error::Toml(_))));
    }
}
