//! Configuration loader for the `ag` CLI.
//!
//! Configuration lives in a single YAML file. Its path comes from `--config`,
//! else the `AIRGRADIENT_CONFIG` environment variable (which may be provided
//! through a `.env` file loaded by the caller), else `config/config.yaml`.
//! Threshold invariants are validated here, before any device is contacted,
//! so the evaluator never sees an inconsistent limit set.
use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_yaml::Mapping;

use crate::alerts::ThresholdConfig;
use crate::error::ConfigError;

pub const CONFIG_ENV: &str = "AIRGRADIENT_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";
pub const DEFAULT_DB_PATH: &str = "data/airgradient.db";
pub const DEFAULT_TIMEOUT_SECS: f64 = 5.0;
/// Longest device timeout accepted from the config file.
pub const MAX_TIMEOUT_SECS: f64 = 3600.0;

// ---

/// One configured device.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeviceConfig {
    pub name: Option<String>,
    pub hostname: Option<String>,
    pub label: Option<String>,
}

impl DeviceConfig {
    /// Name shown in headers: `name`, else `hostname`.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.hostname.as_deref())
            .unwrap_or("unnamed")
    }

    /// Key used for history rows: `label`, else `name`, else `hostname`.
    pub fn storage_label(&self) -> &str {
        self.label
            .as_deref()
            .or(self.name.as_deref())
            .or(self.hostname.as_deref())
            .unwrap_or("unnamed")
    }

    /// `GET` target for current measurements.
    pub fn endpoint(&self) -> Result<String, ConfigError> {
        // ---
        let hostname = self
            .hostname
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ConfigError::MissingHostname(self.display_name().to_string()))?;

        if hostname.starts_with("http://") || hostname.starts_with("https://") {
            Ok(format!("{}/measures/current", hostname.trim_end_matches('/')))
        } else {
            Ok(format!("http://{hostname}/measures/current"))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkConfig {
    pub timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS as u64),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StorageConfig {
    pub db_path: PathBuf,
    /// Persist readings fetched by `status`, `readings` and `alerts` too.
    pub store_on_read: bool,
    /// Print the status view after `store`.
    pub echo_summary: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            store_on_read: false,
            echo_summary: true,
        }
    }
}

/// Strongly typed application configuration.
///
/// Immutable once loaded; passed explicitly to everything that needs it.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    // ---
    /// File this configuration was read from.
    pub path: PathBuf,

    pub default_device: Option<String>,

    pub devices: Vec<DeviceConfig>,

    pub network: NetworkConfig,

    pub storage: StorageConfig,

    /// Validated alert limits, in declaration order.
    pub thresholds: ThresholdConfig,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    default_device: Option<String>,
    devices: Option<Vec<DeviceConfig>>,
    network: Option<RawNetwork>,
    storage: Option<RawStorage>,
    thresholds: Option<Mapping>,
}

#[derive(Debug, Default, Deserialize)]
struct RawNetwork {
    timeout_sec: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawStorage {
    db_path: Option<PathBuf>,
    store_on_read: Option<bool>,
    echo_summary: Option<bool>,
}

/// Device timeout from `network.timeout_sec`: positive, finite and at most
/// [`MAX_TIMEOUT_SECS`].
fn timeout_from_secs(secs: f64) -> Result<Duration, ConfigError> {
    // ---
    let invalid = || ConfigError::Setting {
        key: "network.timeout_sec".to_string(),
        reason: format!("must be between 0 and {MAX_TIMEOUT_SECS} seconds, got {secs}"),
    };
    if !(secs > 0.0 && secs <= MAX_TIMEOUT_SECS) {
        return Err(invalid());
    }
    Duration::try_from_secs_f64(secs).map_err(|_| invalid())
}

/// Pick the config path: explicit flag, then `AIRGRADIENT_CONFIG`, then the
/// default location.
pub fn resolve_path(flag: Option<&Path>) -> PathBuf {
    // ---
    flag.map(Path::to_path_buf)
        .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

impl Config {
    /// Read and validate the file at `path`.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        // ---
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Config::from_yaml(path, &text)
    }

    /// Parse and validate YAML text; `path` is recorded for later edits.
    pub fn from_yaml(path: &Path, text: &str) -> Result<Config, ConfigError> {
        // ---
        let raw: RawConfig = if text.trim().is_empty() {
            RawConfig::default()
        } else {
            serde_yaml::from_str::<Option<RawConfig>>(text)
                .map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?
                .unwrap_or_default()
        };

        let network = raw.network.unwrap_or_default();
        let timeout = timeout_from_secs(network.timeout_sec.unwrap_or(DEFAULT_TIMEOUT_SECS))?;

        let storage = raw.storage.unwrap_or_default();
        let defaults = StorageConfig::default();

        Ok(Config {
            path: path.to_path_buf(),
            default_device: raw.default_device,
            devices: raw.devices.unwrap_or_default(),
            network: NetworkConfig { timeout },
            storage: StorageConfig {
                db_path: storage.db_path.unwrap_or(defaults.db_path),
                store_on_read: storage.store_on_read.unwrap_or(defaults.store_on_read),
                echo_summary: storage.echo_summary.unwrap_or(defaults.echo_summary),
            },
            thresholds: ThresholdConfig::from_mapping(&raw.thresholds.unwrap_or_default())?,
        })
    }

    /// Resolve the device to talk to.
    ///
    /// A hint matches a device's `name` or `hostname`. Without a hint the
    /// `default_device` is used when it names a configured device, otherwise
    /// the first device.
    pub fn select_device(&self, hint: Option<&str>) -> Result<&DeviceConfig, ConfigError> {
        // ---
        if self.devices.is_empty() {
            return Err(ConfigError::NoDevices);
        }
        if let Some(hint) = hint {
            return self
                .devices
                .iter()
                .find(|d| d.name.as_deref() == Some(hint) || d.hostname.as_deref() == Some(hint))
                .ok_or_else(|| ConfigError::UnknownDevice(hint.to_string()));
        }
        let by_default = self.default_device.as_deref().and_then(|name| {
            self.devices
                .iter()
                .find(|d| d.name.as_deref() == Some(name))
        });
        Ok(by_default.unwrap_or(&self.devices[0]))
    }

    /// Log the loaded configuration for debugging purposes.
    pub fn log_config(&self) {
        // ---
        tracing::debug!("Configuration loaded:");
        tracing::debug!("  path           : {}", self.path.display());
        tracing::debug!("  devices        : {}", self.devices.len());
        tracing::debug!("  default_device : {:?}", self.default_device);
        tracing::debug!("  timeout_sec    : {}", self.network.timeout.as_secs_f64());
        tracing::debug!("  db_path        : {}", self.storage.db_path.display());
        tracing::debug!("  store_on_read  : {}", self.storage.store_on_read);
        tracing::debug!("  echo_summary   : {}", self.storage.echo_summary);
        for t in self.thresholds.iter() {
            tracing::debug!("  threshold      : {} {:?}", t.metric.config_key(), t.bound);
        }
    }
}

// ---

/// Replace the value of an existing dotted key (e.g. `thresholds.pm25.warn`)
/// in YAML text, keeping every other line, comment and indentation intact.
///
/// Only block-style mappings indented by two spaces per level are addressable;
/// anything else has to be edited by hand.
pub fn set_value_in_text(text: &str, key_path: &str, value: &str) -> Result<String, ConfigError> {
    // ---
    let not_found = || ConfigError::KeyNotFound(key_path.to_string());
    let keys: Vec<&str> = key_path.split('.').filter(|k| !k.is_empty()).collect();
    if keys.is_empty() {
        return Err(not_found());
    }

    let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
    let mut depth = 0usize;
    let mut target = None;

    for (idx, line) in lines.iter().enumerate() {
        let stripped = line.trim();
        if stripped.is_empty() || stripped.starts_with('#') {
            continue;
        }
        let indent = line.len() - line.trim_start_matches(' ').len();
        if indent < depth * 2 {
            // Left the mapping we were descending into.
            break;
        }
        if indent != depth * 2 {
            continue;
        }
        let Some((key, _)) = stripped.split_once(':') else {
            continue;
        };
        if key.trim() != keys[depth] {
            continue;
        }
        if depth + 1 == keys.len() {
            target = Some((idx, indent, key.trim().to_string()));
            break;
        }
        depth += 1;
    }

    let (idx, indent, key) = target.ok_or_else(not_found)?;
    lines[idx] = format!("{}{}: {}", " ".repeat(indent), key, value);

    let mut out = lines.join("\n");
    if text.ends_with('\n') {
        out.push('\n');
    }
    Ok(out)
}

/// Edit `key_path` in the config file at `path`.
///
/// The edited text must still load as a valid configuration; otherwise the
/// file is left untouched. The new content replaces the old one atomically.
pub fn set_value(path: &Path, key_path: &str, value: &str) -> Result<Config, ConfigError> {
    // ---
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };

    let text = std::fs::read_to_string(path).map_err(io_err)?;
    let updated = set_value_in_text(&text, key_path, value)?;
    let config = Config::from_yaml(path, &updated)?;

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(updated.as_bytes()).map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;

    tracing::info!(key = key_path, value, path = %path.display(), "config updated");
    Ok(config)
}
