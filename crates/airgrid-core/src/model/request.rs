use crate::errors::ValidationError;
use crate::model::Dataset;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// One dataset/date combination to acquire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub dataset: Dataset,
    pub date: NaiveDate,
}

impl FetchRequest {
    pub fn new(dataset: Dataset, date: NaiveDate) -> Self {
        Self { dataset, date }
    }
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| ValidationError::InvalidDate {
        value: raw.to_string(),
    })
}
