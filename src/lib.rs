//! Library behind the `ag` AirGradient monitor CLI.
//!
//! Follows the Explicit Module Boundary Pattern (EMBP): modules talk to each
//! other through the re-exports below rather than reaching into siblings.
//!
//! - `models`   : [`Reading`] and [`HistoricalRecord`]
//! - `classify` : human-readable quality tiers per metric
//! - `alerts`   : threshold configuration and evaluation
//! - `store`    : append-only SQLite history
//! - `config`   : YAML configuration and device selection
//! - `device`   : HTTP client for the device's local API
//! - `render`   : terminal output
//! - `commands` : one handler per subcommand

pub mod alerts;
pub mod classify;
pub mod cli;
pub mod commands;
pub mod config;
pub mod device;
pub mod error;
pub mod models;
pub mod render;
pub mod schema;
pub mod store;

pub use alerts::{evaluate, Evaluation, Severity, ThresholdConfig, Violation};
pub use classify::{classify, Tier};
pub use config::{Config, DeviceConfig};
pub use error::{ConfigError, FetchError, StorageError};
pub use models::{HistoricalRecord, Metric, Reading};
pub use store::HistoryStore;

/// Exit status for any failure outside threshold evaluation: bad config or
/// usage, unreachable device, storage trouble.
pub const EXIT_FAILURE: u8 = 3;
