//! Human-facing text output.
//!
//! Every view is built as a `String` so commands decide where it goes and
//! tests can compare it directly. Colour is applied through a [`Painter`],
//! which is a no-op when colour is off.

use std::env;

use chrono::{DateTime, Local, Utc};
use is_terminal::IsTerminal;
use serde_json::{Map, Value};

use crate::alerts::{Direction, Evaluation, Severity, ThresholdConfig};
use crate::classify::classify;
use crate::models::{Comparison, HistoricalRecord, Metric, Reading};
use crate::store::Summary;

/// Rows shown by the history table; older rows in the window are skipped.
pub const HISTORY_ROW_LIMIT: usize = 200;

pub struct Style;

impl Style {
    pub const RESET: &'static str = "\x1b[0m";
    pub const BOLD: &'static str = "\x1b[1m";
    pub const DIM: &'static str = "\x1b[2m";
    pub const RED: &'static str = "\x1b[31m";
    pub const GREEN: &'static str = "\x1b[32m";
    pub const YELLOW: &'static str = "\x1b[33m";
    pub const GRAY: &'static str = "\x1b[90m";
}

/// Colour on or off for stdout.
pub fn use_color() -> bool {
    color_for(std::io::stdout().is_terminal())
}

/// `FORCE_COLOR=1|true|yes` forces colour on, `0|false|no` off, otherwise it
/// follows `is_tty`. Shared by stdout output and the log formatter.
pub fn color_for(is_tty: bool) -> bool {
    // ---
    match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => is_tty,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Painter {
    color: bool,
}

impl Painter {
    pub fn new(color: bool) -> Self {
        Painter { color }
    }

    pub fn from_env() -> Self {
        Painter::new(use_color())
    }

    pub fn paint(&self, text: &str, code: &str) -> String {
        if self.color {
            format!("{code}{text}{}", Style::RESET)
        } else {
            text.to_string()
        }
    }
}

// ---

/// `value` to `decimals` places followed by `unit`, or `n/a` when absent.
pub fn format_number(value: Option<f64>, unit: &str, decimals: usize) -> String {
    match value {
        None => "n/a".to_string(),
        Some(v) => format!("{v:.decimals$} {unit}").trim_end().to_string(),
    }
}

fn decimals(metric: Metric) -> usize {
    match metric {
        Metric::Pm25 | Metric::Pm10 | Metric::TempC | Metric::Humidity => 1,
        Metric::Co2 | Metric::Tvoc | Metric::Nox | Metric::Wifi => 0,
    }
}

fn format_metric(metric: Metric, value: Option<f64>) -> String {
    format_number(value, metric.unit(), decimals(metric))
}

/// Threshold marker for one value: grey when missing, otherwise the outcome
/// of the configured limit for that metric.
fn threshold_icon(p: &Painter, metric: Metric, value: Option<f64>, limits: &ThresholdConfig) -> String {
    // ---
    let Some(value) = value else {
        return p.paint("⚪", Style::GRAY);
    };
    let violation = limits.check(metric, value);

    match metric.comparison() {
        Comparison::UpperBound => match violation.map(|v| v.severity) {
            Some(Severity::Critical) => p.paint("🟥", Style::RED),
            Some(Severity::Warning) => p.paint("🟨", Style::YELLOW),
            _ => p.paint("✅", Style::GREEN),
        },
        Comparison::Range => match violation.map(|v| v.direction) {
            Some(Direction::Low) => p.paint("⚠️ Low", Style::YELLOW),
            Some(Direction::High) => p.paint("⚠️ High", Style::YELLOW),
            None => p.paint("✅ OK", Style::GREEN),
        },
    }
}

fn tier_label(metric: Metric, value: Option<f64>) -> &'static str {
    value.map(|v| classify(metric, v).label()).unwrap_or("Unknown")
}

/// The `status` view: air quality, climate and device sections.
pub fn status_view(p: &Painter, device_name: &str, reading: &Reading, limits: &ThresholdConfig) -> String {
    // ---
    let mut out = Vec::new();
    out.push(p.paint(&format!("🌡️ AirGradient Status: {device_name}"), Style::BOLD));

    out.push(String::new());
    out.push(p.paint("📊 Air Quality", Style::BOLD));
    for metric in [Metric::Pm25, Metric::Pm10, Metric::Co2, Metric::Tvoc, Metric::Nox] {
        let value = reading.metric(metric);
        out.push(format!(
            "  {:<7} {}  {} {}",
            format!("{}:", metric.label()),
            format_metric(metric, value),
            threshold_icon(p, metric, value, limits),
            tier_label(metric, value),
        ));
    }

    out.push(String::new());
    out.push(p.paint("🌡️ Climate", Style::BOLD));
    for (name, metric) in [("Temp", Metric::TempC), ("Humid", Metric::Humidity)] {
        let value = reading.metric(metric);
        out.push(format!(
            "  {:<7} {}  {} ({})",
            format!("{name}:"),
            format_metric(metric, value),
            threshold_icon(p, metric, value, limits),
            tier_label(metric, value),
        ));
    }

    out.push(String::new());
    out.push(p.paint("📶 Device", Style::BOLD));
    out.push(format!(
        "  {:<7} {} ({})",
        "WiFi:",
        format_metric(Metric::Wifi, reading.wifi_dbm),
        tier_label(Metric::Wifi, reading.wifi_dbm),
    ));
    out.push(format!("  {:<7} {}", "Model:", reading.model.as_deref().unwrap_or("n/a")));
    out.push(format!("  {:<7} {}", "FW:", reading.firmware.as_deref().unwrap_or("n/a")));

    out.join("\n")
}

/// The raw device document, one `key: value` line per field in key order.
pub fn readings_view(p: &Painter, document: &Map<String, Value>) -> String {
    // ---
    let mut keys: Vec<&String> = document.keys().collect();
    keys.sort();

    let mut out = vec![p.paint("📋 Raw Readings", Style::BOLD)];
    for key in keys {
        let value = match &document[key] {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        out.push(format!("  {key}: {value}"));
    }
    out.join("\n")
}

pub fn alerts_view(p: &Painter, evaluation: &Evaluation) -> String {
    // ---
    if evaluation.violations.is_empty() {
        return p.paint("✅ No alerts", Style::GREEN);
    }
    let code = match evaluation.severity {
        Severity::Critical => Style::RED,
        _ => Style::YELLOW,
    };

    let mut out = vec![p.paint("🚨 Alerts", Style::BOLD)];
    out.extend(
        evaluation
            .violations
            .iter()
            .map(|v| p.paint(&format!("  {v}"), code)),
    );
    out.join("\n")
}

/// History table in local time, oldest first, followed by the trend summary.
/// `rows` should already be capped at [`HISTORY_ROW_LIMIT`].
pub fn history_view(p: &Painter, days: u32, rows: &[HistoricalRecord], summary: &Summary) -> String {
    // ---
    let mut out = vec![p.paint(&format!("🕒 History ({days} days)"), Style::BOLD)];

    if rows.is_empty() {
        out.push(p.paint("  No readings in this window", Style::DIM));
        return out.join("\n");
    }

    if summary.records > rows.len() as i64 {
        out.push(p.paint(
            &format!("  showing latest {} of {} readings", rows.len(), summary.records),
            Style::DIM,
        ));
    }

    for record in rows {
        let r = &record.reading;
        out.push(format!(
            "{}  PM2.5 {}  CO2 {}  Temp {}  Hum {}",
            local_time(r.timestamp),
            format_metric(Metric::Pm25, r.pm25),
            format_metric(Metric::Co2, r.co2_ppm),
            format_metric(Metric::TempC, r.temp_c),
            format_metric(Metric::Humidity, r.humidity_pct),
        ));
    }

    out.push(String::new());
    out.push(trend_view(p, summary));
    out.join("\n")
}

/// Min / average / max of every metric seen in the window.
pub fn trend_view(p: &Painter, summary: &Summary) -> String {
    // ---
    let mut out = vec![p.paint(
        &format!("📈 Trend ({} readings)", summary.records),
        Style::BOLD,
    )];
    for m in summary.metrics.iter().filter(|m| m.count > 0) {
        let d = decimals(m.metric);
        out.push(format!(
            "  {:<12} min {}  avg {}  max {}",
            m.metric.label(),
            format_number(m.min, "", d),
            format_number(m.mean, "", d),
            format_number(m.max, m.metric.unit(), d),
        ));
    }
    out.join("\n")
}

/// Full records as a pretty-printed JSON array, oldest first.
pub fn history_json(rows: &[HistoricalRecord]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(rows)
}

pub fn stored_line(p: &Painter, at: DateTime<Utc>) -> String {
    p.paint(&format!("✅ Stored reading at {}", local_time(at)), Style::GREEN)
}

pub fn config_view(p: &Painter, path: &std::path::Path, text: &str) -> String {
    format!(
        "{}\n{}",
        p.paint(&format!("📄 Config: {}", path.display()), Style::BOLD),
        text.trim_end()
    )
}

pub fn config_updated_line(p: &Painter, key: &str, value: &str) -> String {
    p.paint(&format!("✅ Config updated: {key} = {value}"), Style::GREEN)
}

/// Error line written to stderr before a non-zero exit.
pub fn failure_line(p: &Painter, message: &str) -> String {
    p.paint(&format!("❌ {message}"), Style::RED)
}

fn local_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::alerts::{evaluate, Bound, MetricThreshold};
    use crate::store::MetricSummary;
    use chrono::TimeZone;
    use serde_json::json;

    const PLAIN: Painter = Painter { color: false };

    fn limits() -> ThresholdConfig {
        ThresholdConfig::new(vec![
            MetricThreshold {
                metric: Metric::Pm25,
                bound: Bound::Upper { warn: Some(12.0), critical: Some(35.0) },
            },
            MetricThreshold {
                metric: Metric::Co2,
                bound: Bound::Upper { warn: Some(1000.0), critical: Some(2000.0) },
            },
            MetricThreshold {
                metric: Metric::Humidity,
                bound: Bound::Range { min: Some(30.0), max: Some(70.0) },
            },
        ])
        .unwrap()
    }

    fn reading() -> Reading {
        let mut r = Reading::new("office", Utc.with_ymd_and_hms(2025, 3, 26, 12, 0, 0).unwrap());
        r.pm25 = Some(40.0);
        r.co2_ppm = Some(1200.0);
        r.tvoc_index = Some(90.0);
        r.temp_c = Some(21.46);
        r.humidity_pct = Some(25.0);
        r.wifi_dbm = Some(-51.0);
        r.model = Some("I-9PSL".to_string());
        r
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(None, "ppm", 0), "n/a");
        assert_eq!(format_number(Some(4.8), "µg/m³", 1), "4.8 µg/m³");
        assert_eq!(format_number(Some(612.4), "ppm", 0), "612 ppm");
        assert_eq!(format_number(Some(3.0), "", 1), "3.0");
    }

    #[test]
    fn test_status_view_sections_and_icons() {
        // ---
        let out = status_view(&PLAIN, "Office", &reading(), &limits());

        assert!(out.starts_with("🌡️ AirGradient Status: Office"));
        assert!(out.contains("📊 Air Quality"));
        assert!(out.contains("PM2.5:  40.0 µg/m³  🟥 Unhealthy (Sensitive)"));
        assert!(out.contains("CO2:    1200 ppm  🟨 Moderate"));
        assert!(out.contains("TVOC:   90 index  ✅ Good"));
        assert!(out.contains("PM10:   n/a  ⚪ Unknown"));
        assert!(out.contains("Temp:   21.5 °C  ✅ OK (Comfortable)"));
        assert!(out.contains("Humid:  25.0 %  ⚠️ Low (Dry)"));
        assert!(out.contains("WiFi:   -51 dBm (Good)"));
        assert!(out.contains("Model:  I-9PSL"));
        assert!(out.contains("FW:     n/a"));
        assert!(!out.contains('\x1b'));
    }

    #[test]
    fn test_painter_wraps_when_colored() {
        let p = Painter::new(true);
        assert_eq!(p.paint("x", Style::RED), "\x1b[31mx\x1b[0m");
        assert_eq!(PLAIN.paint("x", Style::RED), "x");
    }

    #[test]
    fn test_readings_view_sorts_keys() {
        // ---
        let doc = json!({ "rco2": 512, "atmp": 21.5, "model": "I-9PSL", "pm02": null });
        let out = readings_view(&PLAIN, doc.as_object().unwrap());
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines,
            vec![
                "📋 Raw Readings",
                "  atmp: 21.5",
                "  model: I-9PSL",
                "  pm02: null",
                "  rco2: 512",
            ]
        );
    }

    #[test]
    fn test_alerts_view() {
        // ---
        let quiet = Evaluation { severity: Severity::Ok, violations: vec![] };
        assert_eq!(alerts_view(&PLAIN, &quiet), "✅ No alerts");

        let eval = evaluate(&reading(), &limits());
        let out = alerts_view(&PLAIN, &eval);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "🚨 Alerts");
        assert_eq!(lines[1], "  CRITICAL PM2.5: 40 (critical 35)");
        assert_eq!(lines[2], "  WARN CO2: 1200 (warn 1000)");
        assert_eq!(lines[3], "  WARN Humidity low: 25 (min 30)");
    }

    #[test]
    fn test_history_view_empty_window() {
        let summary = Summary {
            device_label: "office".into(),
            since: Utc::now(),
            until: Utc::now(),
            records: 0,
            metrics: vec![],
        };
        let out = history_view(&PLAIN, 7, &[], &summary);
        assert!(out.contains("🕒 History (7 days)"));
        assert!(out.contains("No readings in this window"));
    }

    #[test]
    fn test_history_view_rows_and_trend() {
        // ---
        let mut r = reading();
        r.pm25 = Some(4.0);
        let rows = vec![HistoricalRecord::new(r)];
        let summary = Summary {
            device_label: "office".into(),
            since: Utc::now(),
            until: Utc::now(),
            records: 450,
            metrics: vec![
                MetricSummary { metric: Metric::Pm25, count: 3, min: Some(2.0), mean: Some(3.0), max: Some(4.0) },
                MetricSummary { metric: Metric::Nox, count: 0, min: None, mean: None, max: None },
            ],
        };

        let out = history_view(&PLAIN, 7, &rows, &summary);
        assert!(out.contains("showing latest 1 of 450 readings"));
        assert!(out.contains("PM2.5 4.0 µg/m³  CO2 1200 ppm  Temp 21.5 °C  Hum 25.0 %"));
        assert!(out.contains("📈 Trend (450 readings)"));
        assert!(out.contains("min 2.0  avg 3.0  max 4.0 µg/m³"));
        assert!(!out.contains("NOx"));
    }

    #[test]
    fn test_history_json_carries_full_record() {
        let rec = HistoricalRecord::new(reading());
        let text = history_json(std::slice::from_ref(&rec)).unwrap();
        let parsed: Vec<HistoricalRecord> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, vec![rec]);
    }

    #[test]
    fn test_failure_line() {
        assert_eq!(failure_line(&PLAIN, "device unreachable"), "❌ device unreachable");
    }
}
