mod errors;
mod exit;
mod fetcher;
mod service;

pub use errors::IngestError;
pub use exit::ExitStatus;
pub use fetcher::{FetchResult, Fetcher};
pub use service::{Acquisition, AcquisitionService};
