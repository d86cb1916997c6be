use airgrid_core::{Dataset, FetchRequest};
use chrono::NaiveDate;
use serde::Serialize;

/// Provenance label recorded on every object acquired through this client.
pub const ADS_SOURCE: &str = "ads";
/// ADS process serving both CAMS Europe datasets.
pub const CAMS_PROCESS: &str = "cams-europe-air-quality-forecasts";

const VARIABLES: [&str; 2] = ["particulate_matter_2.5um", "particulate_matter_10um"];
const ANALYSIS_TIMES: [&str; 6] = ["00:00", "04:00", "08:00", "12:00", "16:00", "20:00"];
const FORECAST_LEAD_HOURS: [&str; 13] = [
    "0", "4", "8", "12", "16", "20", "24", "28", "32", "36", "40", "44", "48",
];
const DATA_FORMAT: &str = "grib";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductType {
    Analysis,
    Forecast,
}

impl ProductType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::Forecast => "forecast",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CamsRequest {
    pub dataset: Dataset,
    pub date: NaiveDate,
}

impl CamsRequest {
    pub fn new(dataset: Dataset, date: NaiveDate) -> Self {
        Self { dataset, date }
    }

    pub fn process(&self) -> &'static str {
        CAMS_PROCESS
    }

    pub fn product_type(&self) -> ProductType {
        match self.dataset {
            Dataset::CamsEuropeAirQualityForecastsAnalysis => ProductType::Analysis,
            Dataset::CamsEuropeAirQualityForecastsForecast => ProductType::Forecast,
        }
    }

    pub fn payload(&self) -> CamsPayload {
        let day = self.date.format("%Y-%m-%d");
        let product_type = self.product_type();
        let (time, leadtime_hour) = match product_type {
            ProductType::Analysis => (ANALYSIS_TIMES.to_vec(), vec!["0"]),
            ProductType::Forecast => (vec!["00:00"], FORECAST_LEAD_HOURS.to_vec()),
        };

        CamsPayload {
            inputs: CamsInputs {
                variable: VARIABLES.to_vec(),
                model: vec!["ensemble"],
                level: vec!["0"],
                date: vec![format!("{day}/{day}")],
                product_type: vec![product_type.as_str()],
                time,
                leadtime_hour,
                data_format: DATA_FORMAT,
            },
        }
    }
}

impl From<FetchRequest> for CamsRequest {
    fn from(request: FetchRequest) -> Self {
        Self::new(request.dataset, request.date)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CamsPayload {
    pub inputs: CamsInputs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CamsInputs {
    pub variable: Vec<&'static str>,
    pub model: Vec<&'static str>,
    pub level: Vec<&'static str>,
    pub date: Vec<String>,
    #[serde(rename = "type")]
    pub product_type: Vec<&'static str>,
    pub time: Vec<&'static str>,
    pub leadtime_hour: Vec<&'static str>,
    pub data_format: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).expect("ymd")
    }

    #[test]
    fn analysis_payload_uses_six_times_and_no_lead() {
        let request = CamsRequest::new(Dataset::CamsEuropeAirQualityForecastsAnalysis, date());
        let inputs = request.payload().inputs;

        assert_eq!(inputs.time, ANALYSIS_TIMES.to_vec());
        assert_eq!(inputs.leadtime_hour, vec!["0"]);
        assert_eq!(inputs.product_type, vec!["analysis"]);
        assert_eq!(inputs.date, vec!["2024-01-15/2024-01-15".to_string()]);
    }

    #[test]
    fn forecast_payload_uses_one_run_and_lead_hours() {
        let request = CamsRequest::new(Dataset::CamsEuropeAirQualityForecastsForecast, date());
        let inputs = request.payload().inputs;

        assert_eq!(inputs.time, vec!["00:00"]);
        assert_eq!(inputs.leadtime_hour.len(), 13);
        assert_eq!(inputs.leadtime_hour.first(), Some(&"0"));
        assert_eq!(inputs.leadtime_hour.last(), Some(&"48"));
        assert_eq!(inputs.product_type, vec!["forecast"]);
    }

    #[test]
    fn both_datasets_target_the_same_process() {
        for dataset in Dataset::ALL {
            assert_eq!(CamsRequest::new(dataset, date()).process(), CAMS_PROCESS);
        }
    }

    #[test]
    fn payload_serializes_with_wire_names() {
        let request = CamsRequest::new(Dataset::CamsEuropeAirQualityForecastsAnalysis, date());
        let json = serde_json::to_value(request.payload()).expect("serialize payload");

        assert_eq!(json["inputs"]["type"], serde_json::json!(["analysis"]));
        assert_eq!(json["inputs"]["data_format"], "grib");
        assert_eq!(
            json["inputs"]["variable"],
            serde_json::json!(["particulate_matter_2.5um", "particulate_matter_10um"])
        );
        assert!(json["inputs"].get("product_type").is_none());
    }
}
