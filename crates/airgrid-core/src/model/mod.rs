mod dataset;
mod request;
mod run_id;

pub use dataset::Dataset;
pub use request::{DATE_FORMAT, FetchRequest, parse_date};
pub use run_id::RunId;
