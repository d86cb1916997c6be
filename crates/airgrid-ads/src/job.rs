use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Accepted,
    Running,
    Successful,
    Failed,
    Rejected,
    Dismissed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Accepted | Self::Running)
    }

    pub fn is_success(self) -> bool {
        self == Self::Successful
    }

    /// Dismissed jobs never produce results, so they count as failures.
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::Rejected | Self::Dismissed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Running => "running",
            Self::Successful => "successful",
            Self::Failed => "failed",
            Self::Rejected => "rejected",
            Self::Dismissed => "dismissed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    #[serde(rename = "jobID")]
    pub job_id: String,
    pub status: JobState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDescriptor {
    #[serde(rename = "type")]
    pub content_type: String,
    pub href: String,
}

impl AssetDescriptor {
    /// File extension for the stored object. Unrecognised content types fall
    /// back to `grib`, the format every request asks for.
    pub fn extension(&self) -> &'static str {
        let essence = self
            .content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "application/x-grib" | "application/grib" | "application/x-grib2" | "application/grib2" => {
                "grib"
            }
            "application/netcdf" | "application/x-netcdf" | "application/x-netcdf4" => "nc",
            "application/zip" | "application/x-zip-compressed" => "zip",
            _ => "grib",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ResultsResponse {
    pub asset: AssetEnvelope,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AssetEnvelope {
    pub value: AssetDescriptor,
}
