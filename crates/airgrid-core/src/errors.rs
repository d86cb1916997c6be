use thiserror::Error;

/// Input the caller must fix; never worth retrying.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("run-id cannot be empty")]
    EmptyRunId,
    #[error("run-id must be a valid UUID: {value}: {reason}")]
    MalformedRunId { value: String, reason: String },
    #[error("run-id must be a UUIDv7, got v{version}: {value}")]
    WrongRunIdVersion { value: String, version: usize },
    #[error("unknown dataset: {0}")]
    UnknownDataset(String),
    #[error("invalid date {value:?}, expected YYYY-MM-DD")]
    InvalidDate { value: String },
    #[error("at least one variable must be requested")]
    EmptyVariableList,
    #[error("variable names cannot be empty")]
    EmptyVariableName,
    #[error("latitude {0} is outside -90..=90")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} is outside -180..=180")]
    LongitudeOutOfRange(f64),
    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("invalid value for {name}: {value:?}")]
    InvalidParameter { name: &'static str, value: String },
}
