//! Point-in-time, point-in-space lookups across several variables.
//!
//! [`QueryService`] answers a [`QueryRequest`] as a unit: every variable
//! resolves or the whole request fails with a single error.

mod aggregator;
mod clickhouse;
mod errors;
mod http;
mod memory;
mod model;
mod store;

pub use aggregator::QueryService;
pub use clickhouse::{ClickHouseConfig, ClickHousePointStore};
pub use errors::QueryError;
pub use http::{router, serve};
pub use memory::MemoryPointStore;
pub use model::{GridValue, QueryRequest, VariableResult};
pub use store::{PointStore, PointStoreError};
