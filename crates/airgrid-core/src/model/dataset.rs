use crate::errors::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dataset {
    CamsEuropeAirQualityForecastsAnalysis,
    CamsEuropeAirQualityForecastsForecast,
}

impl Dataset {
    pub const ALL: [Dataset; 2] = [
        Self::CamsEuropeAirQualityForecastsAnalysis,
        Self::CamsEuropeAirQualityForecastsForecast,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CamsEuropeAirQualityForecastsAnalysis => {
                "cams-europe-air-quality-forecasts-analysis"
            }
            Self::CamsEuropeAirQualityForecastsForecast => {
                "cams-europe-air-quality-forecasts-forecast"
            }
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dataset {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|dataset| dataset.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownDataset(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_str() {
        for dataset in Dataset::ALL {
            assert_eq!(dataset.as_str().parse::<Dataset>(), Ok(dataset));
        }
    }

    #[test]
    fn serde_uses_the_allow_listed_names() {
        let encoded = serde_json::to_string(&Dataset::CamsEuropeAirQualityForecastsAnalysis)
            .expect("serialize");
        assert_eq!(encoded, "\"cams-europe-air-quality-forecasts-analysis\"");
    }

    #[test]
    fn unknown_dataset_is_rejected() {
        assert_eq!(
            "cams-global-reanalysis".parse::<Dataset>(),
            Err(ValidationError::UnknownDataset(
                "cams-global-reanalysis".to_string()
            ))
        );
        assert!("".parse::<Dataset>().is_err());
    }
}
