//! Threshold alert evaluation.
//!
//! A [`ThresholdConfig`] is validated once when the config file is loaded;
//! after that [`evaluate`] is a pure, total function over any [`Reading`].
//!
//! Upper-bound metrics (particulates, CO2, TVOC, NOx) have two levels:
//! `warn` and `critical`, both inclusive. Range-bound metrics (temperature,
//! humidity, WiFi signal) describe a comfort band `[min, max]` and only ever
//! produce a `Warning`: they are comfort limits, not safety limits, so there
//! is no critical range tier.

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::error::ConfigError;
use crate::models::{Comparison, Metric, Reading};

// ---

/// Overall outcome of one evaluation. Ordered `Ok < Warning < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Ok,
    Warning,
    Critical,
}

impl Severity {
    /// Process exit status for the `alerts` command.
    pub fn exit_code(self) -> u8 {
        match self {
            Severity::Ok => 0,
            Severity::Warning => 1,
            Severity::Critical => 2,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Severity::Ok => "OK",
            Severity::Warning => "WARN",
            Severity::Critical => "CRITICAL",
        }
    }
}

/// Which side of the configured limit the value fell on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    High,
    Low,
}

/// Limits for one metric. Either side may be left open.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    Upper {
        warn: Option<f64>,
        critical: Option<f64>,
    },
    Range {
        min: Option<f64>,
        max: Option<f64>,
    },
}

impl Bound {
    /// Compare one value. Returns the severity, direction and crossed limit.
    pub fn check(&self, value: f64) -> Option<(Severity, Direction, f64)> {
        match *self {
            Bound::Upper { warn, critical } => {
                if let Some(c) = critical.filter(|c| value >= *c) {
                    return Some((Severity::Critical, Direction::High, c));
                }
                warn.filter(|w| value >= *w)
                    .map(|w| (Severity::Warning, Direction::High, w))
            }
            Bound::Range { min, max } => {
                if let Some(lo) = min.filter(|lo| value < *lo) {
                    return Some((Severity::Warning, Direction::Low, lo));
                }
                max.filter(|hi| value > *hi)
                    .map(|hi| (Severity::Warning, Direction::High, hi))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricThreshold {
    pub metric: Metric,
    pub bound: Bound,
}

/// Configured limits in the order they were declared in the config file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThresholdConfig {
    entries: Vec<MetricThreshold>,
}

/// Shape of one `thresholds.<metric>` entry before validation.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBound {
    warn: Option<f64>,
    critical: Option<f64>,
    min: Option<f64>,
    max: Option<f64>,
}

impl ThresholdConfig {
    /// Validate and order a list of limits. Fails on duplicates, non-finite
    /// limits, `warn > critical`, `min > max`, or a bound shape that does not
    /// match the metric's comparison kind.
    pub fn new(entries: Vec<MetricThreshold>) -> Result<Self, ConfigError> {
        // ---
        for (i, entry) in entries.iter().enumerate() {
            if entries[..i].iter().any(|e| e.metric == entry.metric) {
                return Err(ConfigError::DuplicateMetric {
                    metric: entry.metric.config_key().to_string(),
                });
            }
            validate(entry)?;
        }
        Ok(ThresholdConfig { entries })
    }

    /// Parse the `thresholds:` section of the config file.
    pub fn from_mapping(section: &Mapping) -> Result<Self, ConfigError> {
        // ---
        let mut entries = Vec::with_capacity(section.len());
        for (key, value) in section {
            let key = key.as_str().ok_or_else(|| ConfigError::Threshold {
                metric: format!("{key:?}"),
                reason: "metric names must be strings".to_string(),
            })?;
            let metric =
                Metric::from_config_key(key).ok_or_else(|| ConfigError::UnknownMetric(key.into()))?;

            let raw: RawBound = match value {
                Value::Null => RawBound::default(),
                other => serde_yaml::from_value(other.clone()).map_err(|e| {
                    ConfigError::Threshold {
                        metric: key.to_string(),
                        reason: e.to_string(),
                    }
                })?,
            };
            entries.push(MetricThreshold {
                metric,
                bound: shape(metric, raw)?,
            });
        }
        ThresholdConfig::new(entries)
    }

    pub fn get(&self, metric: Metric) -> Option<&Bound> {
        self.entries
            .iter()
            .find(|e| e.metric == metric)
            .map(|e| &e.bound)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricThreshold> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check a single value against the metric's configured limits, if any.
    pub fn check(&self, metric: Metric, value: f64) -> Option<Violation> {
        let bound = self.get(metric)?;
        let (severity, direction, limit) = bound.check(value)?;
        Some(Violation {
            metric,
            observed: value,
            severity,
            direction,
            limit,
        })
    }
}

fn shape(metric: Metric, raw: RawBound) -> Result<Bound, ConfigError> {
    // ---
    let fail = |reason: &str| ConfigError::Threshold {
        metric: metric.config_key().to_string(),
        reason: reason.to_string(),
    };

    match metric.comparison() {
        Comparison::UpperBound => {
            if raw.min.is_some() || raw.max.is_some() {
                return Err(fail("upper-bound metrics take 'warn'/'critical', not 'min'/'max'"));
            }
            if raw.warn.is_none() && raw.critical.is_none() {
                return Err(fail("expected at least one of 'warn' or 'critical'"));
            }
            Ok(Bound::Upper {
                warn: raw.warn,
                critical: raw.critical,
            })
        }
        Comparison::Range => {
            if raw.warn.is_some() || raw.critical.is_some() {
                return Err(fail("range metrics take 'min'/'max', not 'warn'/'critical'"));
            }
            if raw.min.is_none() && raw.max.is_none() {
                return Err(fail("expected at least one of 'min' or 'max'"));
            }
            Ok(Bound::Range {
                min: raw.min,
                max: raw.max,
            })
        }
    }
}

fn validate(entry: &MetricThreshold) -> Result<(), ConfigError> {
    // ---
    let fail = |reason: String| ConfigError::Threshold {
        metric: entry.metric.config_key().to_string(),
        reason,
    };

    let (kind_ok, lo, hi, names) = match entry.bound {
        Bound::Upper { warn, critical } => (
            entry.metric.comparison() == Comparison::UpperBound,
            warn,
            critical,
            ("warn", "critical"),
        ),
        Bound::Range { min, max } => (
            entry.metric.comparison() == Comparison::Range,
            min,
            max,
            ("min", "max"),
        ),
    };

    if !kind_ok {
        return Err(fail("bound shape does not match the metric".to_string()));
    }
    for (name, v) in [(names.0, lo), (names.1, hi)] {
        if v.is_some_and(|v| !v.is_finite()) {
            return Err(fail(format!("'{name}' must be a finite number")));
        }
    }
    if let (Some(lo), Some(hi)) = (lo, hi) {
        if lo > hi {
            return Err(fail(format!(
                "'{}' ({lo}) must not exceed '{}' ({hi})",
                names.0, names.1
            )));
        }
    }
    Ok(())
}

// ---

/// One metric's breach of its configured limit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Violation {
    pub metric: Metric,
    pub observed: f64,
    pub severity: Severity,
    pub direction: Direction,
    pub limit: f64,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // ---
        let side = match (self.metric.comparison(), self.direction) {
            (Comparison::Range, Direction::Low) => " low",
            (Comparison::Range, Direction::High) => " high",
            (Comparison::UpperBound, _) => "",
        };
        let limit_name = match (self.severity, self.direction, self.metric.comparison()) {
            (_, Direction::Low, _) => "min",
            (_, Direction::High, Comparison::Range) => "max",
            (Severity::Critical, _, _) => "critical",
            _ => "warn",
        };
        write!(
            f,
            "{} {}{}: {} ({} {})",
            self.severity.tag(),
            self.metric.label(),
            side,
            self.observed,
            limit_name,
            self.limit
        )
    }
}

/// Result of [`evaluate`]: the worst severity plus every violation in
/// configuration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub severity: Severity,
    pub violations: Vec<Violation>,
}

impl Evaluation {
    pub fn exit_code(&self) -> u8 {
        self.severity.exit_code()
    }
}

/// Compare every metric present in both the reading and the config.
///
/// Metrics missing on either side are skipped; they never raise severity.
pub fn evaluate(reading: &Reading, config: &ThresholdConfig) -> Evaluation {
    // ---
    let violations: Vec<Violation> = config
        .iter()
        .filter_map(|t| {
            let value = reading.metric(t.metric)?;
            config.check(t.metric, value)
        })
        .collect();

    let severity = violations
        .iter()
        .map(|v| v.severity)
        .max()
        .unwrap_or(Severity::Ok);

    Evaluation {
        severity,
        violations,
    }
}
