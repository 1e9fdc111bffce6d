use super::ForecastSource;
use crate::error::{AppError, Result};
use crate::fetcher::Fetcher;
use crate::parser::SwellTableParser;
use crate::reading::Reading;
use crate::region::Region;
use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

pub const SOURCE_NAME: &str = "swell_table";

/// Scrapes the per-region swell table page.
pub struct SwellTableSource {
    fetcher: Fetcher,
    base_url: String,
}

impl SwellTableSource {
    pub fn new(fetcher: Fetcher, base_url: &str) -> Self {
        Self {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn region_url(&self, region: Region) -> String {
        format!("{}/{}", self.base_url, region.slug())
    }

    async fn fetch_impl(&self, region: Region) -> Result<Reading> {
        let url = self.region_url(region);
        let html = self.fetcher.get_text(&url).await?;
        let conditions = SwellTableParser::parse(&html)?;

        let captured_at = Utc::now();
        let reading =
            conditions.into_reading(region, captured_at.date_naive(), captured_at, SOURCE_NAME)?;

        debug!(
            "{}: {} swell {:.1}m @ {}s {}",
            SOURCE_NAME, region, reading.swell.height, reading.swell.period, reading.swell.cardinal_direction
        );
        Ok(reading)
    }
}

#[async_trait]
impl ForecastSource for SwellTableSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn fetch(&self, region: Region) -> Result<Reading> {
        self.fetch_impl(region)
            .await
            .map_err(|e| AppError::source_unavailable(SOURCE_NAME, e))
    }
}
