use crate::error::AppError;
use crate::orchestrator::{ForecastService, RegionConditions};
use crate::reading::{Swell, Wind};
use crate::region::Region;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

#[derive(Debug, Deserialize)]
pub struct ForecastQuery {
    pub region: String,
    pub date: Option<String>,
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ForecastResponse {
    pub wind: Wind,
    pub swell: Swell,
    /// Capture time, epoch milliseconds
    pub timestamp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegionSummary {
    pub name: String,
    pub slug: String,
}

/// Error body returned by the forecast endpoints.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<AppError> for ApiError {
    fn from(e: AppError) -> Self {
        let status = match &e {
            AppError::NoForecastAvailable { .. } => StatusCode::NOT_FOUND,
            AppError::InvalidData(_) => StatusCode::BAD_REQUEST,
            e if e.is_store_failure() => {
                error!("Store failure while serving forecast: {}", e);
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

/// Current conditions for one region.
///
/// # Errors
/// `400` for an unknown region or malformed date, `404` when no source and no
/// stored reading can answer, `503` when the store cannot be read.
pub async fn get_forecast(
    State(service): State<Arc<ForecastService>>,
    query: Result<Query<ForecastQuery>, QueryRejection>,
) -> Result<Json<ForecastResponse>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let region: Region = query.region.parse()?;
    let date = match query.date.as_deref() {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
            ApiError::bad_request(format!("Invalid date '{}', expected YYYY-MM-DD", raw))
        })?,
        None => Utc::now().date_naive(),
    };

    let reading = service.forecast(region, date, query.refresh).await?;

    Ok(Json(ForecastResponse {
        timestamp: reading.timestamp(),
        wind: reading.wind,
        swell: reading.swell,
    }))
}

/// Today's conditions for every region with data; `{}` when there is none.
pub async fn get_all_forecasts(
    State(service): State<Arc<ForecastService>>,
) -> Json<RegionConditions> {
    Json(service.all_regions().await)
}

pub async fn list_regions() -> Json<Vec<RegionSummary>> {
    Json(
        Region::ALL
            .iter()
            .map(|r| RegionSummary {
                name: r.name().to_string(),
                slug: r.slug().to_string(),
            })
            .collect(),
    )
}

pub async fn health() -> &'static str {
    "ok"
}
