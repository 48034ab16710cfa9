//! ==============================================================================
//! smoke.rs - end-to-end check against a running hub
//! ==============================================================================
//!
//! usage:
//!     cargo run --bin smoke -- http://localhost:3000
//!     SMOKE_BASE_URL=https://my-hub.example.net cargo run --bin smoke
//!
//! steps:
//!     1. GET  /health                         -> status "healthy"
//!     2. POST /api/sensor-data                -> success, id assigned
//!     3. GET  /api/sensor-data                -> at least one record
//!     4. GET  /api/sensor-data?sensorType=aqi -> our record, fields intact
//!
//! exits non-zero on the first failed step.
//!
//! ==============================================================================

use anyhow::{bail, ensure, Context, Result};
use serde_json::{json, Value};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let base = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("SMOKE_BASE_URL").ok())
        .unwrap_or_else(|| "http://localhost:3000".to_string());
    let base = base.trim_end_matches('/');
    let client = reqwest::Client::new();

    tracing::info!("Testing sensor hub at {}", base);

    // 1. health
    let health: Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .context("health request failed")?
        .json()
        .await?;
    ensure!(health["status"] == "healthy", "unexpected health answer: {}", health);
    tracing::info!("✓ Health check passed (storage: {})", health["services"]["storage"]);

    // 2. submit
    let reading = json!({
        "sensorType": "aqi",
        "value": 45.5,
        "location": "Test Location",
        "description": "Test submission"
    });
    let response = client
        .post(format!("{}/api/sensor-data", base))
        .json(&reading)
        .send()
        .await
        .context("submit request failed")?;
    let status = response.status();
    let submitted: Value = response.json().await?;
    if !status.is_success() || submitted["success"] != true {
        bail!("submission rejected ({}): {}", status, submitted);
    }
    let id = submitted["data"]["id"]
        .as_str()
        .context("submission response has no id")?
        .to_string();
    tracing::info!("✓ Data submission successful: {}", submitted["message"]);
    tracing::info!("  Submitted data ID: {}", id);

    // 3. list everything
    let all: Value = client
        .get(format!("{}/api/sensor-data", base))
        .send()
        .await
        .context("list request failed")?
        .json()
        .await?;
    let count = all["data"].as_array().map(Vec::len).unwrap_or(0);
    ensure!(count >= 1, "expected at least one record, got {}", all);
    tracing::info!("✓ Data retrieval successful: {} records found", count);

    // 4. filtered list contains our record unchanged
    let filtered: Value = client
        .get(format!("{}/api/sensor-data", base))
        .query(&[("sensorType", "aqi")])
        .send()
        .await
        .context("filtered list request failed")?
        .json()
        .await?;
    let records = filtered["data"].as_array().context("filtered list has no data")?;
    ensure!(
        records.iter().all(|r| r["sensorType"] == "aqi"),
        "filter leaked other sensor types"
    );
    let ours = records
        .iter()
        .find(|r| r["id"] == id.as_str())
        .context("submitted record missing from filtered list")?;
    for field in ["sensorType", "value", "location", "description"] {
        ensure!(
            ours[field] == submitted["data"][field],
            "field {} changed between submit and list",
            field
        );
    }
    tracing::info!("✓ Filtered retrieval returned the submitted record");

    tracing::info!("All checks passed. Open {} in a browser to use the form.", base);
    Ok(())
}
