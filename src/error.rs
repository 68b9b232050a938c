//! Error types for Pluto

use thiserror::Error;

/// Result type alias for Pluto operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Pluto pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Outbound channel error (SMS or voice delivery)
    #[error("channel error: {0}")]
    Channel(String),

    /// Context source error (email, calendar, reminders)
    #[error("context source error: {0}")]
    Source(String),

    /// Caller supplied a value outside the accepted range
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Embedding error
    #[error("embedding error: {0}")]
    Embedding(String),
}
