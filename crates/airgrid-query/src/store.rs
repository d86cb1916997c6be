use crate::model::GridValue;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PointStoreError {
    /// No sample of the variable exists at or before the requested time.
    #[error("grid value not found")]
    NotFound,
    #[error("point store backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait PointStore: Send + Sync {
    /// Latest sample of `variable` at or before `timestamp`, taken from the
    /// grid point nearest to (`lat`, `lon`). Never returns a later sample.
    async fn get_value(
        &self,
        variable: &str,
        timestamp: DateTime<Utc>,
        lat: f64,
        lon: f64,
    ) -> Result<GridValue, PointStoreError>;
}

pub(crate) fn squared_distance(lat_a: f64, lon_a: f64, lat_b: f64, lon_b: f64) -> f64 {
    (lat_a - lat_b) * (lat_a - lat_b) + (lon_a - lon_b) * (lon_a - lon_b)
}
