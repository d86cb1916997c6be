pub mod errors;
pub mod model;
pub mod stream;

pub use errors::ValidationError;
pub use model::{DATE_FORMAT, Dataset, FetchRequest, RunId, parse_date};
pub use stream::{ByteStream, stream_from_bytes};
