use crate::aggregator::QueryService;
use crate::errors::QueryError;
use crate::model::{QueryRequest, VariableResult};
use airgrid_core::ValidationError;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Clone)]
struct AppState {
    service: Arc<QueryService>,
}

pub fn router(service: Arc<QueryService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/environmental", get(environmental))
        .with_state(AppState { service })
}

/// Serves the query API until `shutdown` is cancelled, then drains open
/// connections.
pub async fn serve(
    listener: TcpListener,
    service: Arc<QueryService>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "query API listening");
    axum::serve(listener, router(service))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
struct EnvironmentalParams {
    lat: Option<String>,
    lon: Option<String>,
    time: Option<String>,
    vars: Option<String>,
}

impl EnvironmentalParams {
    fn into_request(self) -> Result<QueryRequest, ValidationError> {
        let lat = parse_coordinate("lat", self.lat)?;
        let lon = parse_coordinate("lon", self.lon)?;
        let raw_time = self.time.ok_or(ValidationError::MissingParameter("time"))?;
        let time = DateTime::parse_from_rfc3339(raw_time.trim())
            .map_err(|_| ValidationError::InvalidParameter {
                name: "time",
                value: raw_time.clone(),
            })?
            .with_timezone(&Utc);
        let raw_vars = self.vars.ok_or(ValidationError::MissingParameter("vars"))?;
        let variables = if raw_vars.trim().is_empty() {
            Vec::new()
        } else {
            raw_vars.split(',').map(|name| name.trim().to_string()).collect()
        };
        QueryRequest::new(lat, lon, time, variables)
    }
}

fn parse_coordinate(name: &'static str, raw: Option<String>) -> Result<f64, ValidationError> {
    let raw = raw.ok_or(ValidationError::MissingParameter(name))?;
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ValidationError::InvalidParameter { name, value: raw }),
    }
}

async fn environmental(
    State(state): State<AppState>,
    params: Result<Query<EnvironmentalParams>, QueryRejection>,
) -> Result<Json<EnvironmentalResponse>, QueryError> {
    let Query(params) = params.map_err(|rejection| ValidationError::InvalidParameter {
        name: "query",
        value: rejection.body_text(),
    })?;
    let request = params.into_request()?;

    // Dropping the handler future (client went away) cancels the lookups.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let results = state.service.get_variables(&request, &cancel).await?;
    Ok(Json(EnvironmentalResponse::new(&request, results)))
}

#[derive(Debug, Serialize)]
struct EnvironmentalResponse {
    lat: f64,
    lon: f64,
    time: DateTime<Utc>,
    variables: Vec<VariableBody>,
}

#[derive(Debug, Serialize)]
struct VariableBody {
    name: String,
    value: f64,
    unit: String,
    lineage: Lineage,
}

#[derive(Debug, Serialize)]
struct Lineage {
    ref_timestamp: DateTime<Utc>,
    catalog_id: Uuid,
    lat: f64,
    lon: f64,
}

impl EnvironmentalResponse {
    fn new(request: &QueryRequest, results: Vec<VariableResult>) -> Self {
        Self {
            lat: request.lat,
            lon: request.lon,
            time: request.time,
            variables: results
                .into_iter()
                .map(|result| VariableBody {
                    name: result.name,
                    value: result.value,
                    unit: result.unit,
                    lineage: Lineage {
                        ref_timestamp: result.timestamp,
                        catalog_id: result.catalog_id,
                        lat: result.lat,
                        lon: result.lon,
                    },
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    kind: &'static str,
    message: String,
}

impl QueryError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::VariableNotFound { .. } => StatusCode::NOT_FOUND,
            Self::Infrastructure { .. } | Self::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, kind = self.kind(), "environmental query failed");
        } else {
            warn!(error = %self, kind = self.kind(), "environmental query rejected");
        }
        let body = ErrorResponse {
            error: ErrorDetail {
                kind: self.kind(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(lat: &str, lon: &str, time: &str, vars: &str) -> EnvironmentalParams {
        EnvironmentalParams {
            lat: Some(lat.to_string()),
            lon: Some(lon.to_string()),
            time: Some(time.to_string()),
            vars: Some(vars.to_string()),
        }
    }

    #[test]
    fn parses_a_complete_query() {
        let request = params("52.23", "21.01", "2025-03-12T12:30:00+01:00", "pm2p5, pm10")
            .into_request()
            .expect("request");
        assert_eq!(request.variables, ["pm2p5", "pm10"]);
        assert_eq!(request.time.to_rfc3339(), "2025-03-12T11:30:00+00:00");
    }

    #[test]
    fn reports_the_offending_parameter() {
        let missing = EnvironmentalParams {
            lat: None,
            ..params("0", "0", "2025-03-12T12:00:00Z", "a")
        };
        assert_eq!(
            missing.into_request(),
            Err(ValidationError::MissingParameter("lat"))
        );
        assert_eq!(
            params("0", "east", "2025-03-12T12:00:00Z", "a").into_request(),
            Err(ValidationError::InvalidParameter {
                name: "lon",
                value: "east".to_string()
            })
        );
        assert_eq!(
            params("0", "0", "yesterday", "a").into_request(),
            Err(ValidationError::InvalidParameter {
                name: "time",
                value: "yesterday".to_string()
            })
        );
        assert_eq!(
            params("0", "0", "2025-03-12T12:00:00Z", "").into_request(),
            Err(ValidationError::EmptyVariableList)
        );
        assert_eq!(
            params("0", "0", "2025-03-12T12:00:00Z", "a,,b").into_request(),
            Err(ValidationError::EmptyVariableName)
        );
        assert!(params("NaN", "0", "2025-03-12T12:00:00Z", "a")
            .into_request()
            .is_err());
    }

    #[test]
    fn error_kinds_map_to_statuses() {
        assert_eq!(
            QueryError::from(ValidationError::EmptyVariableList).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(QueryError::Cancelled.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            QueryError::Task("panic".to_string()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
