use crate::store::PointStoreError;
use airgrid_core::ValidationError;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("variable {variable:?} not found at time: {timestamp} lat: {lat} lon: {lon}")]
    VariableNotFound {
        variable: String,
        timestamp: DateTime<Utc>,
        lat: f64,
        lon: f64,
    },
    #[error("getting variable {variable:?}: {source}")]
    Infrastructure {
        variable: String,
        #[source]
        source: PointStoreError,
    },
    #[error("lookup task failed: {0}")]
    Task(String),
    #[error("query cancelled")]
    Cancelled,
}

impl QueryError {
    /// Machine-readable kind reported to API clients.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "invalid_request",
            Self::VariableNotFound { .. } => "variable_not_found",
            Self::Infrastructure { .. } | Self::Task(_) => "infrastructure_error",
            Self::Cancelled => "cancelled",
        }
    }
}
