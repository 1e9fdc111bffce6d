//! Forecast providers, each turning a region into a validated [`Reading`].

pub mod marine_api;
pub mod swell_table;

use crate::config::SourcesConfig;
use crate::error::Result;
use crate::fetcher::Fetcher;
use crate::reading::Reading;
use crate::region::Region;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub use marine_api::MarineApiSource;
pub use swell_table::SwellTableSource;

/// A single upstream forecast provider.
///
/// Implementations return [`crate::error::AppError::SourceUnavailable`] for
/// any failure: network, unexpected payload shape, or values that fail
/// validation.
#[async_trait]
pub trait ForecastSource: Send + Sync {
    fn name(&self) -> &str;

    /// Current conditions for `region`, stamped with today's date and the
    /// capture time.
    async fn fetch(&self, region: Region) -> Result<Reading>;
}

/// Build the enabled sources in priority order.
pub fn build_sources(config: &SourcesConfig) -> Result<Vec<Arc<dyn ForecastSource>>> {
    let fetcher = Fetcher::new(
        Duration::from_secs(config.timeout_seconds),
        config.max_retries,
    )?;

    let mut sources: Vec<Arc<dyn ForecastSource>> = Vec::new();

    if let Some(swell_table) = config.swell_table.as_ref().filter(|s| s.enabled) {
        sources.push(Arc::new(SwellTableSource::new(
            fetcher.clone(),
            &swell_table.base_url,
        )));
    }

    if let Some(marine) = config.marine_api.as_ref().filter(|s| s.enabled) {
        sources.push(Arc::new(MarineApiSource::new(
            fetcher.clone(),
            &marine.base_url,
            marine.api_key.clone(),
        )));
    }

    info!(
        "Forecast sources in priority order: {:?}",
        sources.iter().map(|s| s.name()).collect::<Vec<_>>()
    );

    Ok(sources)
}
