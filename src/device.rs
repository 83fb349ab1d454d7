//! HTTP client for an AirGradient device's local API.
//!
//! One `GET /measures/current` per invocation, bounded by the configured
//! timeout. Field-level problems in the payload are tolerated (see
//! [`Reading::from_document`]); only a body that is not a JSON object fails
//! the fetch.

use std::time::Duration;

use chrono::Utc;
use serde_json::{Map, Value};

use crate::error::FetchError;
use crate::models::Reading;

// ---

/// The raw device document plus the reading built from it.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub document: Map<String, Value>,
    pub reading: Reading,
}

pub struct DeviceClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl DeviceClient {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        // ---
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;

        Ok(DeviceClient { client, timeout })
    }

    /// Fetch the current measurement document from `endpoint`.
    pub async fn fetch_document(&self, endpoint: &str) -> Result<Map<String, Value>, FetchError> {
        // ---
        tracing::debug!("Fetching current measures from: {}", endpoint);

        let response = self
            .client
            .get(endpoint)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| self.transport_error(endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(endpoint, e))?;

        let payload_error = |reason: String| FetchError::Payload {
            endpoint: endpoint.to_string(),
            reason,
        };
        let value: Value = serde_json::from_slice(&body)
            .map_err(|e| payload_error(format!("invalid JSON response from device: {e}")))?;

        tracing::debug!("Device response: {}", value);

        match value {
            Value::Object(map) => Ok(map),
            other => Err(payload_error(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Fetch a reading from `endpoint`, labelled `device_label` and stamped
    /// with the current time.
    pub async fn fetch(&self, endpoint: &str, device_label: &str) -> Result<Snapshot, FetchError> {
        // ---
        let document = self.fetch_document(endpoint).await?;
        let reading = Reading::from_document(device_label, Utc::now(), &document);

        tracing::info!(
            device = device_label,
            metrics = reading.present_metrics().count(),
            "fetched reading"
        );
        Ok(Snapshot { document, reading })
    }

    fn transport_error(&self, endpoint: &str, source: reqwest::Error) -> FetchError {
        if source.is_timeout() {
            FetchError::Timeout {
                endpoint: endpoint.to_string(),
                timeout_secs: self.timeout.as_secs_f64(),
            }
        } else {
            FetchError::Transport {
                endpoint: endpoint.to_string(),
                source,
            }
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
