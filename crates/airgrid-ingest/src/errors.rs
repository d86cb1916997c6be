use crate::exit::ExitStatus;
use airgrid_ads::FetchError;
use airgrid_core::ValidationError;
use airgrid_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("failed to store {key}: {source}")]
    Store {
        key: String,
        #[source]
        source: StoreError,
    },
    #[error("acquisition cancelled before the object was written")]
    Cancelled,
}

impl IngestError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Fetch(_) => "fetch",
            Self::Store { .. } => "storage",
            Self::Cancelled => "cancelled",
        }
    }

    /// Only bad input is final; everything else may succeed on a fresh run.
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            Self::Validation(_) => ExitStatus::ConfigError,
            _ => ExitStatus::ApplicationError,
        }
    }
}
