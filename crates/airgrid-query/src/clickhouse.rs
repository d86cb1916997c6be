use crate::model::GridValue;
use crate::store::{PointStore, PointStoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

const MAX_EXECUTION_SECS: &str = "15";

const NEAREST_SAMPLE_SQL: &str = "\
SELECT value, unit, lat, lon, toString(catalog_id) AS catalog_id, toUnixTimestamp(timestamp) AS ts
FROM grid_data FINAL
WHERE variable = {variable:String}
  AND timestamp = (
    SELECT max(timestamp) FROM grid_data FINAL
    WHERE variable = {variable:String}
      AND timestamp <= toDateTime({ts:Int64}, 'UTC')";

const WINDOW_SQL: &str = "
      AND timestamp >= toDateTime({from:Int64}, 'UTC')";

const ORDER_SQL: &str = "
  )
ORDER BY (lat - {lat:Float64}) * (lat - {lat:Float64}) + (lon - {lon:Float64}) * (lon - {lon:Float64})
LIMIT 1
FORMAT JSONEachRow";

#[derive(Debug, Clone)]
pub struct ClickHouseConfig {
    /// Base URL of the HTTP interface, e.g. `http://localhost:8123`.
    pub url: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub snap_window: Option<Duration>,
    pub request_timeout: Duration,
}

impl ClickHouseConfig {
    pub fn new(url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user: "default".to_string(),
            password: String::new(),
            database: database.into(),
            snap_window: None,
            request_timeout: Duration::from_secs(20),
        }
    }
}

/// Point store backed by the `grid_data` table, queried over ClickHouse's
/// HTTP interface with bound query parameters.
#[derive(Debug, Clone)]
pub struct ClickHousePointStore {
    http: reqwest::Client,
    config: ClickHouseConfig,
}

#[derive(Debug, Deserialize)]
struct SampleRow {
    value: f64,
    unit: String,
    lat: f64,
    lon: f64,
    catalog_id: Uuid,
    ts: i64,
}

impl ClickHousePointStore {
    pub fn new(config: ClickHouseConfig) -> Result<Self, PointStoreError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| PointStoreError::Backend(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    fn sql(&self) -> String {
        let window = if self.config.snap_window.is_some() {
            WINDOW_SQL
        } else {
            ""
        };
        format!("{NEAREST_SAMPLE_SQL}{window}{ORDER_SQL}")
    }

    fn params(
        &self,
        variable: &str,
        timestamp: DateTime<Utc>,
        lat: f64,
        lon: f64,
    ) -> Vec<(&'static str, String)> {
        let ts = timestamp.timestamp();
        let mut params = vec![
            ("database", self.config.database.clone()),
            ("max_execution_time", MAX_EXECUTION_SECS.to_string()),
            ("param_variable", variable.to_string()),
            ("param_ts", ts.to_string()),
            ("param_lat", lat.to_string()),
            ("param_lon", lon.to_string()),
        ];
        if let Some(window) = self.config.snap_window {
            let window = i64::try_from(window.as_secs()).unwrap_or(i64::MAX);
            params.push(("param_from", ts.saturating_sub(window).to_string()));
        }
        params
    }
}

#[async_trait]
impl PointStore for ClickHousePointStore {
    async fn get_value(
        &self,
        variable: &str,
        timestamp: DateTime<Utc>,
        lat: f64,
        lon: f64,
    ) -> Result<GridValue, PointStoreError> {
        let response = self
            .http
            .post(self.config.url.trim_end_matches('/'))
            .query(&self.params(variable, timestamp, lat, lon))
            .header("X-ClickHouse-User", &self.config.user)
            .header("X-ClickHouse-Key", &self.config.password)
            .body(self.sql())
            .send()
            .await
            .map_err(|e| PointStoreError::Backend(format!("clickhouse request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PointStoreError::Backend(format!("failed to read clickhouse response: {e}")))?;
        if !status.is_success() {
            return Err(PointStoreError::Backend(format!(
                "clickhouse returned {status}: {}",
                body.trim()
            )));
        }

        let Some(line) = body.lines().find(|line| !line.trim().is_empty()) else {
            debug!(variable, %timestamp, "no sample at or before requested time");
            return Err(PointStoreError::NotFound);
        };
        let row: SampleRow = serde_json::from_str(line)
            .map_err(|e| PointStoreError::Backend(format!("malformed clickhouse row: {e}")))?;
        let sample_time = DateTime::from_timestamp(row.ts, 0).ok_or_else(|| {
            PointStoreError::Backend(format!("sample timestamp out of range: {}", row.ts))
        })?;

        Ok(GridValue {
            value: row.value,
            unit: row.unit,
            lat: row.lat,
            lon: row.lon,
            timestamp: sample_time,
            catalog_id: row.catalog_id,
        })
    }
}
