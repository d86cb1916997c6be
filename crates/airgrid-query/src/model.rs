use airgrid_core::ValidationError;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// One sample as stored: the nearest grid point at the latest time not after
/// the requested one.
#[derive(Debug, Clone, PartialEq)]
pub struct GridValue {
    pub value: f64,
    pub unit: String,
    pub lat: f64,
    pub lon: f64,
    pub timestamp: DateTime<Utc>,
    pub catalog_id: Uuid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableResult {
    pub name: String,
    pub value: f64,
    pub unit: String,
    pub lat: f64,
    pub lon: f64,
    /// Time of the sample actually used, which may precede the request.
    pub timestamp: DateTime<Utc>,
    pub catalog_id: Uuid,
}

impl VariableResult {
    pub fn new(name: impl Into<String>, grid: GridValue) -> Self {
        Self {
            name: name.into(),
            value: grid.value,
            unit: grid.unit,
            lat: grid.lat,
            lon: grid.lon,
            timestamp: grid.timestamp,
            catalog_id: grid.catalog_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub lat: f64,
    pub lon: f64,
    pub time: DateTime<Utc>,
    /// Response order follows this order. Duplicates are kept.
    pub variables: Vec<String>,
}

impl QueryRequest {
    pub fn new(
        lat: f64,
        lon: f64,
        time: DateTime<Utc>,
        variables: Vec<String>,
    ) -> Result<Self, ValidationError> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(ValidationError::LatitudeOutOfRange(lat));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(ValidationError::LongitudeOutOfRange(lon));
        }
        if variables.is_empty() {
            return Err(ValidationError::EmptyVariableList);
        }
        if variables.iter().any(|name| name.trim().is_empty()) {
            return Err(ValidationError::EmptyVariableName);
        }
        Ok(Self {
            lat,
            lon,
            time,
            variables,
        })
    }
}
