//! Typed failures raised by the configuration, device and storage layers.
//!
//! Core components return these directly. Only the binary translates them
//! into user-facing text and the collaborator exit code (see
//! [`crate::EXIT_FAILURE`]). The threshold evaluator has no error type: it is
//! total once a [`crate::ThresholdConfig`] has been validated.

use std::path::PathBuf;

use chrono::{DateTime, Utc};

// ---

/// Malformed or self-contradictory configuration. Always fatal and always
/// reported before the device is contacted.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "config not found at {}. Copy config/config.example.yaml to config/config.yaml",
        .0.display()
    )]
    NotFound(PathBuf),

    #[error("unable to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid YAML in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("no devices configured. Add devices to config.yaml")]
    NoDevices,

    #[error("device '{0}' not found in config")]
    UnknownDevice(String),

    #[error("device '{0}' has no hostname")]
    MissingHostname(String),

    #[error("unknown threshold metric '{0}'")]
    UnknownMetric(String),

    #[error("threshold for '{metric}' is configured more than once")]
    DuplicateMetric { metric: String },

    #[error("invalid threshold for '{metric}': {reason}")]
    Threshold { metric: String, reason: String },

    #[error("invalid setting {key}: {reason}")]
    Setting { key: String, reason: String },

    #[error("key path '{0}' not found in config. Edit manually")]
    KeyNotFound(String),
}

/// Device unreachable, too slow, or answering with something that is not a
/// JSON object. Never retried.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("unable to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("timed out after {timeout_secs}s waiting for {endpoint}")]
    Timeout { endpoint: String, timeout_secs: f64 },

    #[error("{endpoint} answered HTTP {status}")]
    Status { endpoint: String, status: u16 },

    #[error("network error talking to {endpoint}: {source}")]
    Transport {
        endpoint: String,
        source: reqwest::Error,
    },

    #[error("invalid payload from {endpoint}: {reason}")]
    Payload { endpoint: String, reason: String },
}

/// Persistence failure. A dropped sample is silent data loss, so these are
/// always surfaced to the caller.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("no database found at {}. Run 'ag store' to collect data", .0.display())]
    NotFound(PathBuf),

    #[error("unable to prepare storage directory {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("database schema version {found} does not match expected version {expected}")]
    SchemaMismatch { found: i64, expected: i64 },

    #[error("timestamp {0} cannot be stored with nanosecond precision")]
    TimestampOutOfRange(DateTime<Utc>),

    #[error("SQLite error: {0}")]
    Sqlx(#[from] sqlx::Error),
}
