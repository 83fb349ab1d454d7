//! End-to-end tests: the compiled `ag` binary against a fake device served
//! by axum on a loopback port.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use airgradient::{HistoryStore, Metric};
use anyhow::Result;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::{Duration, Utc};
use futures::TryStreamExt;
use serde_json::{json, Value};
use tokio::process::Command;

// ---

struct FakeDevice {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl FakeDevice {
    async fn serve(document: Value) -> Result<Self> {
        // ---
        let hits = Arc::new(AtomicUsize::new(0));
        let state = (Arc::new(document), hits.clone());
        let app = Router::new()
            .route("/measures/current", get(measures))
            .with_state(state);

        Self::serve_router(app, hits).await
    }

    /// A device whose `/measures/current` is answered by `app`.
    async fn serve_router(app: Router, hits: Arc<AtomicUsize>) -> Result<Self> {
        // ---
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(FakeDevice { addr, hits })
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn measures(State((doc, hits)): State<(Arc<Value>, Arc<AtomicUsize>)>) -> Json<Value> {
    hits.fetch_add(1, Ordering::SeqCst);
    Json((*doc).clone())
}

fn document(pm25: f64, co2: f64, humidity: f64) -> Value {
    json!({
        "pm02": pm25 + 1.0,
        "pm02Compensated": pm25,
        "pm10": 6.2,
        "rco2": co2,
        "atmp": 22.4,
        "rhum": humidity,
        "tvocIndex": 96,
        "noxIndex": 1,
        "wifi": -52,
        "model": "I-9PSL",
        "firmware": "3.1.9",
        "serialno": "ecda3b1a2b3c"
    })
}

/// Scratch working directory with `config/config.yaml` pointing at `host`.
fn workspace(host: &str, thresholds: &str) -> Result<tempfile::TempDir> {
    // ---
    let dir = tempfile::tempdir()?;
    std::fs::create_dir_all(dir.path().join("config"))?;
    let yaml = format!(
        "\
default_device: office
devices:
  - name: office
    hostname: {host}
network:
  timeout_sec: 2
storage:
  db_path: data/airgradient.db
  store_on_read: false
  echo_summary: true
thresholds:
{thresholds}"
    );
    std::fs::write(config_path(dir.path()), yaml)?;
    Ok(dir)
}

const THRESHOLDS: &str = "  pm25:
    warn: 12
    critical: 35
  co2:
    warn: 1000
    critical: 2000
  humidity:
    min: 30
    max: 70
";

/// `warn` above `critical`: rejected when the config is loaded.
const INVERTED_PM25: &str = "  pm25:
    warn: 50
    critical: 35
";

fn config_path(dir: &Path) -> PathBuf {
    dir.join("config").join("config.yaml")
}

async fn ag(dir: &Path, args: &[&str]) -> Result<Output> {
    // ---
    let output = Command::new(env!("CARGO_BIN_EXE_ag"))
        .args(args)
        .current_dir(dir)
        .env_remove("AIRGRADIENT_CONFIG")
        .env_remove("RUST_LOG")
        .env("FORCE_COLOR", "0")
        .output()
        .await?;
    Ok(output)
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// ---

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn alerts_exit_code_tracks_severity() -> Result<()> {
    // ---
    let cases = [
        (document(5.0, 550.0, 45.0), 0, "No alerts"),
        (document(5.0, 1200.0, 45.0), 1, "WARN CO2: 1200 (warn 1000)"),
        (document(5.0, 550.0, 22.0), 1, "WARN Humidity low: 22 (min 30)"),
        (document(40.0, 1200.0, 45.0), 2, "CRITICAL PM2.5: 40 (critical 35)"),
    ];

    for (doc, expected, needle) in cases {
        let device = FakeDevice::serve(doc).await?;
        let dir = workspace(&device.addr.to_string(), THRESHOLDS)?;

        let out = ag(dir.path(), &["alerts"]).await?;
        assert_eq!(out.status.code(), Some(expected), "stderr: {}", stderr(&out));
        assert!(stdout(&out).contains(needle), "missing {needle:?} in:\n{}", stdout(&out));
        assert_eq!(device.hits(), 1);
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unreachable_device_exits_three() -> Result<()> {
    // ---
    // Bind then drop a listener to get a port nothing is serving on.
    let port = {
        let l = std::net::TcpListener::bind("127.0.0.1:0")?;
        l.local_addr()?.port()
    };
    let dir = workspace(&format!("127.0.0.1:{port}"), THRESHOLDS)?;

    let out = ag(dir.path(), &["alerts"]).await?;
    assert_eq!(out.status.code(), Some(3));
    assert!(stderr(&out).contains("❌"), "stderr: {}", stderr(&out));
    assert!(stdout(&out).is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn invalid_thresholds_fail_before_fetch() -> Result<()> {
    // ---
    let device = FakeDevice::serve(document(5.0, 550.0, 45.0)).await?;
    let dir = workspace(&device.addr.to_string(), INVERTED_PM25)?;

    for args in [&["alerts"][..], &["status"][..], &["store"][..]] {
        let out = ag(dir.path(), args).await?;
        assert_eq!(out.status.code(), Some(3), "{args:?}");
        assert!(stderr(&out).contains("pm25"), "stderr: {}", stderr(&out));
    }
    assert_eq!(device.hits(), 0);
    assert!(!dir.path().join("data").exists());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unknown_device_and_usage_errors_exit_three() -> Result<()> {
    // ---
    let device = FakeDevice::serve(document(5.0, 550.0, 45.0)).await?;
    let dir = workspace(&device.addr.to_string(), THRESHOLDS)?;

    let out = ag(dir.path(), &["status", "--device", "garage"]).await?;
    assert_eq!(out.status.code(), Some(3));
    assert!(stderr(&out).contains("garage"));

    let out = ag(dir.path(), &["frobnicate"]).await?;
    assert_eq!(out.status.code(), Some(3));

    let out = ag(dir.path(), &["--help"]).await?;
    assert_eq!(out.status.code(), Some(0));

    assert_eq!(device.hits(), 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_config_points_at_example() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let out = ag(dir.path(), &["status"]).await?;
    assert_eq!(out.status.code(), Some(3));
    assert!(stderr(&out).contains("config.example.yaml"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn status_renders_sections() -> Result<()> {
    // ---
    let device = FakeDevice::serve(document(40.0, 1200.0, 45.0)).await?;
    let dir = workspace(&device.addr.to_string(), THRESHOLDS)?;

    let out = ag(dir.path(), &["status"]).await?;
    assert_eq!(out.status.code(), Some(0), "stderr: {}", stderr(&out));

    let text = stdout(&out);
    assert!(text.contains("AirGradient Status: office"));
    assert!(text.contains("🟥 Unhealthy (Sensitive)"));
    assert!(text.contains("Model:  I-9PSL"));
    assert!(!text.contains('\x1b'), "FORCE_COLOR=0 must disable ANSI");

    // store_on_read is off: nothing persisted.
    assert!(!dir.path().join("data").exists());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn readings_json_is_device_document() -> Result<()> {
    // ---
    let doc = document(5.0, 550.0, 45.0);
    let device = FakeDevice::serve(doc.clone()).await?;
    let dir = workspace(&device.addr.to_string(), THRESHOLDS)?;

    let out = ag(dir.path(), &["readings", "--json"]).await?;
    assert_eq!(out.status.code(), Some(0));
    let printed: Value = serde_json::from_slice(&out.stdout)?;
    assert_eq!(printed, doc);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_store_processes_all_land() -> Result<()> {
    // ---
    const WRITERS: usize = 8;
    let device = FakeDevice::serve(document(7.5, 640.0, 41.0)).await?;
    let dir = workspace(&device.addr.to_string(), THRESHOLDS)?;

    let runs = (0..WRITERS).map(|_| ag(dir.path(), &["store"]));
    for out in futures::future::join_all(runs).await {
        let out = out?;
        assert_eq!(out.status.code(), Some(0), "stderr: {}", stderr(&out));
        assert!(stdout(&out).contains("Stored reading at"));
    }
    assert_eq!(device.hits(), WRITERS);

    let store = HistoryStore::open_existing(&dir.path().join("data/airgradient.db")).await?;
    let until = Utc::now();
    let rows: Vec<_> = store
        .query_range("office", until - Duration::hours(1), until)
        .try_collect()
        .await?;
    assert_eq!(rows.len(), WRITERS);
    assert!(rows.iter().all(|r| r.reading.pm25 == Some(7.5)));
    assert!(rows.iter().all(|r| r.reading.serial.as_deref() == Some("ecda3b1a2b3c")));
    assert!(rows.windows(2).all(|w| w[0].reading.timestamp <= w[1].reading.timestamp));

    let summary = store.summarize("office", until - Duration::hours(1), until).await?;
    assert_eq!(summary.records, WRITERS as i64);
    assert_eq!(summary.metric(Metric::Co2).map(|m| m.mean), Some(Some(640.0)));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn history_reads_back_stored_readings() -> Result<()> {
    // ---
    let device = FakeDevice::serve(document(9.0, 700.0, 50.0)).await?;
    let dir = workspace(&device.addr.to_string(), THRESHOLDS)?;

    let out = ag(dir.path(), &["history"]).await?;
    assert_eq!(out.status.code(), Some(3));
    assert!(stderr(&out).contains("Run 'ag store'"));

    for _ in 0..3 {
        assert_eq!(ag(dir.path(), &["store"]).await?.status.code(), Some(0));
    }
    let hits = device.hits();

    let out = ag(dir.path(), &["history", "--json"]).await?;
    assert_eq!(out.status.code(), Some(0), "stderr: {}", stderr(&out));
    let records: Vec<Value> = serde_json::from_slice(&out.stdout)?;
    assert_eq!(records.len(), 3);
    assert_eq!(records[0]["device_label"], "office");
    assert_eq!(records[0]["co2_ppm"], 700.0);

    let out = ag(dir.path(), &["history", "--days", "1"]).await?;
    assert_eq!(out.status.code(), Some(0));
    let text = stdout(&out);
    assert!(text.contains("History (1 days)"));
    assert!(text.contains("Trend (3 readings)"));

    assert_eq!(device.hits(), hits, "history must not contact the device");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn config_set_validates_before_writing() -> Result<()> {
    // ---
    let dir = workspace("127.0.0.1:9", THRESHOLDS)?;
    let path = config_path(dir.path());

    let out = ag(dir.path(), &["config", "set", "thresholds.pm25.warn", "15"]).await?;
    assert_eq!(out.status.code(), Some(0), "stderr: {}", stderr(&out));
    let text = std::fs::read_to_string(&path)?;
    assert!(text.contains("    warn: 15\n"));
    assert!(text.contains("    critical: 35\n"));

    let before = std::fs::read_to_string(&path)?;
    let out = ag(dir.path(), &["config", "set", "thresholds.pm25.warn", "90"]).await?;
    assert_eq!(out.status.code(), Some(3));
    assert_eq!(std::fs::read_to_string(&path)?, before);

    let out = ag(dir.path(), &["config", "show"]).await?;
    assert_eq!(out.status.code(), Some(0));
    assert!(stdout(&out).contains("warn: 15"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn config_commands_work_on_an_invalid_file() -> Result<()> {
    // ---
    let device = FakeDevice::serve(document(5.0, 550.0, 45.0)).await?;
    let dir = workspace(&device.addr.to_string(), INVERTED_PM25)?;

    let out = ag(dir.path(), &["config", "show"]).await?;
    assert_eq!(out.status.code(), Some(0), "stderr: {}", stderr(&out));
    assert!(stdout(&out).contains("warn: 50"));

    let out = ag(dir.path(), &["config", "set", "thresholds.pm25.warn", "10"]).await?;
    assert_eq!(out.status.code(), Some(0), "stderr: {}", stderr(&out));
    assert!(std::fs::read_to_string(config_path(dir.path()))?.contains("    warn: 10\n"));

    // Repaired: device commands run again.
    let out = ag(dir.path(), &["alerts"]).await?;
    assert_eq!(out.status.code(), Some(0), "stderr: {}", stderr(&out));
    assert_eq!(device.hits(), 1);
    Ok(())
}

/// Fake devices that misbehave in ways a real one might.
async fn faulty_device(app: Router) -> Result<(FakeDevice, tempfile::TempDir)> {
    // ---
    let device = FakeDevice::serve_router(app, Arc::new(AtomicUsize::new(0))).await?;
    let dir = workspace(&device.addr.to_string(), THRESHOLDS)?;
    let out = ag(dir.path(), &["config", "set", "network.timeout_sec", "1"]).await?;
    assert_eq!(out.status.code(), Some(0), "stderr: {}", stderr(&out));
    Ok((device, dir))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_device_times_out() -> Result<()> {
    // ---
    let app = Router::new().route(
        "/measures/current",
        get(|| async {
            tokio::time::sleep(StdDuration::from_secs(10)).await;
            Json(document(5.0, 550.0, 45.0))
        }),
    );
    let (_device, dir) = faulty_device(app).await?;

    let started = Instant::now();
    let out = ag(dir.path(), &["alerts"]).await?;
    assert_eq!(out.status.code(), Some(3));
    assert!(stderr(&out).contains("timed out after 1s"), "stderr: {}", stderr(&out));
    assert!(started.elapsed() < StdDuration::from_secs(8), "fetch was not bounded");
    assert!(stdout(&out).is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn device_error_status_exits_three() -> Result<()> {
    // ---
    let app = Router::new().route(
        "/measures/current",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "sensor fault") }),
    );
    let (_device, dir) = faulty_device(app).await?;

    let out = ag(dir.path(), &["status"]).await?;
    assert_eq!(out.status.code(), Some(3));
    assert!(stderr(&out).contains("HTTP 500"), "stderr: {}", stderr(&out));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn non_object_payload_exits_three() -> Result<()> {
    // ---
    let app = Router::new().route("/measures/current", get(|| async { Json(json!([1, 2])) }));
    let (_device, dir) = faulty_device(app).await?;

    let out = ag(dir.path(), &["store"]).await?;
    assert_eq!(out.status.code(), Some(3));
    assert!(stderr(&out).contains("expected a JSON object"), "stderr: {}", stderr(&out));
    assert!(!dir.path().join("data").exists(), "nothing stored on a failed fetch");
    Ok(())
}
