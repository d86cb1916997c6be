//! Client for the Atmosphere Data Store process API.
//!
//! Requests run asynchronously on the remote side: a submission returns a job
//! id, the job is polled until it reaches a terminal state, and a successful
//! job exposes a downloadable asset.

mod client;
mod config;
mod errors;
mod job;
mod request;

pub use client::{AdsClient, AssetStream};
pub use config::AdsConfig;
pub use errors::{AdsError, FetchError, Step};
pub use job::{AssetDescriptor, JobHandle, JobState};
pub use request::{ADS_SOURCE, CAMS_PROCESS, CamsInputs, CamsPayload, CamsRequest, ProductType};
