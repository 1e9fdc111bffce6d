use super::ForecastSource;
use crate::error::{AppError, Result};
use crate::fetcher::Fetcher;
use crate::parser::MarinePayload;
use crate::reading::Reading;
use crate::region::Region;
use async_trait::async_trait;
use chrono::Utc;

pub const SOURCE_NAME: &str = "marine_api";

const CURRENT_FIELDS: &str =
    "swell_wave_height,swell_wave_period,swell_wave_direction,wind_speed_10m,wind_direction_10m";

/// Gridded marine conditions API queried by region coordinates.
pub struct MarineApiSource {
    fetcher: Fetcher,
    base_url: String,
    api_key: Option<String>,
}

impl MarineApiSource {
    pub fn new(fetcher: Fetcher, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.to_string(),
            api_key,
        }
    }

    fn query(&self, region: Region) -> Vec<(&'static str, String)> {
        let (latitude, longitude) = region.coordinates();
        let mut query = vec![
            ("latitude", latitude.to_string()),
            ("longitude", longitude.to_string()),
            ("current", CURRENT_FIELDS.to_string()),
            ("wind_speed_unit", "kmh".to_string()),
            ("timezone", "GMT".to_string()),
        ];
        if let Some(key) = &self.api_key {
            query.push(("apikey", key.clone()));
        }
        query
    }

    async fn fetch_impl(&self, region: Region) -> Result<Reading> {
        let payload: MarinePayload = self
            .fetcher
            .get_json(&self.base_url, &self.query(region))
            .await?;
        let captured_at = Utc::now();
        let conditions = payload.into_conditions(captured_at)?;

        conditions.into_reading(region, captured_at.date_naive(), captured_at, SOURCE_NAME)
    }
}

#[async_trait]
impl ForecastSource for MarineApiSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn fetch(&self, region: Region) -> Result<Reading> {
        self.fetch_impl(region)
            .await
            .map_err(|e| AppError::source_unavailable(SOURCE_NAME, e))
    }
}
