use crate::model::GridValue;
use crate::store::{PointStore, PointStoreError, squared_distance};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

/// In-process point store, used for tests and local runs without ClickHouse.
#[derive(Debug, Default)]
pub struct MemoryPointStore {
    samples: RwLock<HashMap<String, Vec<GridValue>>>,
    snap_window: Option<Duration>,
}

impl MemoryPointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ignore samples older than `window` before the requested time.
    pub fn with_snap_window(mut self, window: Duration) -> Self {
        self.snap_window = Some(window);
        self
    }

    pub fn insert(&self, variable: impl Into<String>, sample: GridValue) {
        let mut samples = match self.samples.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        samples.entry(variable.into()).or_default().push(sample);
    }
}

#[async_trait]
impl PointStore for MemoryPointStore {
    async fn get_value(
        &self,
        variable: &str,
        timestamp: DateTime<Utc>,
        lat: f64,
        lon: f64,
    ) -> Result<GridValue, PointStoreError> {
        let samples = self
            .samples
            .read()
            .map_err(|_| PointStoreError::Backend("sample table lock poisoned".to_string()))?;
        let Some(rows) = samples.get(variable) else {
            return Err(PointStoreError::NotFound);
        };

        let earliest = self
            .snap_window
            .and_then(|window| TimeDelta::from_std(window).ok())
            .and_then(|window| timestamp.checked_sub_signed(window));
        let eligible = rows.iter().filter(|row| {
            row.timestamp <= timestamp && earliest.is_none_or(|from| row.timestamp >= from)
        });

        let Some(latest) = eligible.clone().map(|row| row.timestamp).max() else {
            return Err(PointStoreError::NotFound);
        };

        eligible
            .filter(|row| row.timestamp == latest)
            .min_by(|a, b| {
                squared_distance(a.lat, a.lon, lat, lon)
                    .total_cmp(&squared_distance(b.lat, b.lon, lat, lon))
            })
            .cloned()
            .ok_or(PointStoreError::NotFound)
    }
}
