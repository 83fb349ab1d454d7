//! Data models for air-quality samples.
//!
//! A [`Reading`] is built once per successful device fetch and never mutated.
//! Every metric is optional because the set a device reports depends on its
//! model and firmware; an absent metric stays absent all the way through the
//! history store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

// ---

/// How a metric is compared against its configured limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// Higher is worse: `warn` / `critical`.
    UpperBound,
    /// Comfort range: `min` / `max`.
    Range,
}

/// The fixed set of metrics a device may report, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Pm25,
    Pm10,
    Co2,
    Tvoc,
    Nox,
    TempC,
    Humidity,
    Wifi,
}

impl Metric {
    pub const ALL: [Metric; 8] = [
        Metric::Pm25,
        Metric::Pm10,
        Metric::Co2,
        Metric::Tvoc,
        Metric::Nox,
        Metric::TempC,
        Metric::Humidity,
        Metric::Wifi,
    ];

    /// Key used under `thresholds:` in the config file.
    pub fn config_key(self) -> &'static str {
        match self {
            Metric::Pm25 => "pm25",
            Metric::Pm10 => "pm10",
            Metric::Co2 => "co2",
            Metric::Tvoc => "tvoc",
            Metric::Nox => "nox",
            Metric::TempC => "temp_c",
            Metric::Humidity => "humidity",
            Metric::Wifi => "wifi",
        }
    }

    pub fn from_config_key(key: &str) -> Option<Metric> {
        Metric::ALL.into_iter().find(|m| m.config_key() == key)
    }

    /// Column holding this metric in the `readings` table.
    pub fn column(self) -> &'static str {
        match self {
            Metric::Pm25 => "pm25",
            Metric::Pm10 => "pm10",
            Metric::Co2 => "co2_ppm",
            Metric::Tvoc => "tvoc_index",
            Metric::Nox => "nox_index",
            Metric::TempC => "temp_c",
            Metric::Humidity => "humidity_pct",
            Metric::Wifi => "wifi_dbm",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::Pm25 => "PM2.5",
            Metric::Pm10 => "PM10",
            Metric::Co2 => "CO2",
            Metric::Tvoc => "TVOC",
            Metric::Nox => "NOx",
            Metric::TempC => "Temperature",
            Metric::Humidity => "Humidity",
            Metric::Wifi => "WiFi",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Metric::Pm25 | Metric::Pm10 => "µg/m³",
            Metric::Co2 => "ppm",
            Metric::Tvoc | Metric::Nox => "index",
            Metric::TempC => "°C",
            Metric::Humidity => "%",
            Metric::Wifi => "dBm",
        }
    }

    pub fn comparison(self) -> Comparison {
        match self {
            Metric::Pm25 | Metric::Pm10 | Metric::Co2 | Metric::Tvoc | Metric::Nox => {
                Comparison::UpperBound
            }
            Metric::TempC | Metric::Humidity | Metric::Wifi => Comparison::Range,
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---

/// One point-in-time sample from a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    // ---
    pub timestamp: DateTime<Utc>,
    pub device_label: String,
    pub pm25: Option<f64>,
    pub pm10: Option<f64>,
    pub co2_ppm: Option<f64>,
    pub temp_c: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub tvoc_index: Option<f64>,
    pub nox_index: Option<f64>,
    pub wifi_dbm: Option<f64>,
    pub model: Option<String>,
    pub firmware: Option<String>,
    pub serial: Option<String>,
}

impl Reading {
    /// An empty reading: every metric and metadata field absent.
    pub fn new(device_label: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Reading {
            timestamp,
            device_label: device_label.into(),
            pm25: None,
            pm10: None,
            co2_ppm: None,
            temp_c: None,
            humidity_pct: None,
            tvoc_index: None,
            nox_index: None,
            wifi_dbm: None,
            model: None,
            firmware: None,
            serial: None,
        }
    }

    /// Build a reading from the device's `/measures/current` document.
    ///
    /// Compensated values (`pm02Compensated`, `atmpCompensated`,
    /// `rhumCompensated`) win over raw ones when the firmware reports both.
    /// A field with the wrong JSON type or a non-finite value is treated as
    /// absent rather than failing the whole reading.
    pub fn from_document(
        device_label: impl Into<String>,
        timestamp: DateTime<Utc>,
        doc: &Map<String, Value>,
    ) -> Self {
        // ---
        let number = |key: &str| doc.get(key).and_then(lenient_number);
        let text = |key: &str| doc.get(key).and_then(lenient_text);

        Reading {
            timestamp,
            device_label: device_label.into(),
            pm25: number("pm02Compensated").or_else(|| number("pm02")),
            pm10: number("pm10"),
            co2_ppm: number("rco2"),
            temp_c: number("atmpCompensated").or_else(|| number("atmp")),
            humidity_pct: number("rhumCompensated").or_else(|| number("rhum")),
            tvoc_index: number("tvocIndex"),
            nox_index: number("noxIndex"),
            wifi_dbm: number("wifi"),
            model: text("model"),
            firmware: text("firmware"),
            serial: text("serialno"),
        }
    }

    pub fn metric(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Pm25 => self.pm25,
            Metric::Pm10 => self.pm10,
            Metric::Co2 => self.co2_ppm,
            Metric::Tvoc => self.tvoc_index,
            Metric::Nox => self.nox_index,
            Metric::TempC => self.temp_c,
            Metric::Humidity => self.humidity_pct,
            Metric::Wifi => self.wifi_dbm,
        }
    }

    /// Metrics present in this reading, in display order.
    pub fn present_metrics(&self) -> impl Iterator<Item = (Metric, f64)> + '_ {
        Metric::ALL
            .into_iter()
            .filter_map(|m| self.metric(m).map(|v| (m, v)))
    }
}

fn lenient_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn lenient_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ---

/// A durable row in the history store: one per fetch, never updated.
///
/// The row id is generated at construction, so two records built from
/// readings with the same device and timestamp are still distinct rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    pub id: Uuid,
    #[serde(flatten)]
    pub reading: Reading,
}

impl HistoricalRecord {
    pub fn new(reading: Reading) -> Self {
        HistoricalRecord {
            id: Uuid::new_v4(),
            reading,
        }
    }
}
