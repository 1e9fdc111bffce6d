use crate::cache::{ConditionsCache, ALL_REGIONS_KEY};
use crate::db::ReadingStore;
use crate::error::{AppError, Result};
use crate::freshness::FreshnessPolicy;
use crate::reading::Reading;
use crate::region::Region;
use crate::sources::ForecastSource;
use chrono::{NaiveDate, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_AGGREGATE_TTL: Duration = Duration::from_secs(300);

/// Region name to that region's current reading.
pub type RegionConditions = BTreeMap<String, Reading>;

/// Serves readings by walking store, then each source in priority order.
pub struct ForecastService {
    store: Arc<dyn ReadingStore>,
    cache: Arc<dyn ConditionsCache>,
    sources: Vec<Arc<dyn ForecastSource>>,
    freshness: FreshnessPolicy,
    source_timeout: Duration,
    aggregate_ttl: Duration,
}

impl ForecastService {
    pub fn new(
        store: Arc<dyn ReadingStore>,
        cache: Arc<dyn ConditionsCache>,
        sources: Vec<Arc<dyn ForecastSource>>,
    ) -> Self {
        Self {
            store,
            cache,
            sources,
            freshness: FreshnessPolicy::default(),
            source_timeout: DEFAULT_SOURCE_TIMEOUT,
            aggregate_ttl: DEFAULT_AGGREGATE_TTL,
        }
    }

    pub fn with_freshness(mut self, freshness: FreshnessPolicy) -> Self {
        self.freshness = freshness;
        self
    }

    /// Upper bound on a single source call, including its retries.
    pub fn with_source_timeout(mut self, timeout: Duration) -> Self {
        self.source_timeout = timeout;
        self
    }

    pub fn with_aggregate_ttl(mut self, ttl: Duration) -> Self {
        self.aggregate_ttl = ttl;
        self
    }

    /// Reading for `region` on `date`.
    ///
    /// Sources only report current conditions, so they are consulted only
    /// when `date` is today. For any other date the stored reading is
    /// returned as-is, without a freshness check.
    pub async fn forecast(
        &self,
        region: Region,
        date: NaiveDate,
        force_refresh: bool,
    ) -> Result<Reading> {
        let now = Utc::now();
        let today = now.date_naive();

        if date != today {
            return self
                .store
                .get(region, date)
                .await?
                .ok_or_else(|| AppError::NoForecastAvailable {
                    region: region.to_string(),
                    date,
                });
        }

        if !force_refresh {
            if let Some(stored) = self.store.get(region, date).await? {
                if self.freshness.is_fresh(stored.captured_at, now) {
                    debug!("Serving stored reading for {} on {}", region, date);
                    return Ok(stored);
                }
                debug!(
                    "Stored reading for {} captured at {} is stale",
                    region, stored.captured_at
                );
            }
        }

        for source in &self.sources {
            match self.fetch_from(source.as_ref(), region).await {
                Ok(reading) => {
                    if let Err(e) = self.store.put(&reading).await {
                        warn!(
                            "Failed to store {} reading for {}: {}",
                            source.name(),
                            region,
                            e
                        );
                    }
                    info!("Fetched {} conditions from {}", region, source.name());
                    return Ok(reading);
                }
                Err(e) => {
                    warn!("{}", e);
                }
            }
        }

        Err(AppError::NoForecastAvailable {
            region: region.to_string(),
            date,
        })
    }

    async fn fetch_from(&self, source: &dyn ForecastSource, region: Region) -> Result<Reading> {
        match tokio::time::timeout(self.source_timeout, source.fetch(region)).await {
            Ok(Ok(reading)) => Ok(reading),
            Ok(Err(e @ AppError::SourceUnavailable { .. })) => Err(e),
            Ok(Err(e)) => Err(AppError::source_unavailable(source.name(), e)),
            Err(_) => Err(AppError::source_unavailable(
                source.name(),
                format!("timed out after {:?}", self.source_timeout),
            )),
        }
    }

    /// Today's reading for every region that has one. Never fails: cache and
    /// store errors degrade to a miss and an empty map respectively.
    pub async fn all_regions(&self) -> RegionConditions {
        match self.cache.get(ALL_REGIONS_KEY).await {
            Ok(Some(payload)) => match serde_json::from_str::<RegionConditions>(&payload) {
                Ok(conditions) => {
                    debug!("All-regions cache hit ({} regions)", conditions.len());
                    return conditions;
                }
                Err(e) => warn!("Discarding undecodable all-regions cache entry: {}", e),
            },
            Ok(None) => debug!("All-regions cache miss"),
            Err(e) => warn!("All-regions cache read failed, treating as miss: {}", e),
        }

        let today = Utc::now().date_naive();
        let readings = match self.store.latest_for_date(today).await {
            Ok(readings) => readings,
            Err(e) => {
                warn!("All-regions store read failed, returning no data: {}", e);
                return RegionConditions::new();
            }
        };

        if readings.is_empty() {
            return RegionConditions::new();
        }

        let conditions: RegionConditions = readings
            .into_iter()
            .map(|reading| (reading.region.name().to_string(), reading))
            .collect();

        match serde_json::to_string(&conditions) {
            Ok(payload) => {
                if let Err(e) = self
                    .cache
                    .set(ALL_REGIONS_KEY, payload, self.aggregate_ttl)
                    .await
                {
                    warn!("All-regions cache write failed: {}", e);
                }
            }
            Err(e) => warn!("Failed to encode all-regions conditions: {}", e),
        }

        conditions
    }

    /// Walk every region through [`Self::forecast`] for today, returning how
    /// many regions ended up with a reading.
    pub async fn refresh_all(&self, delay_between: Duration) -> usize {
        let today = Utc::now().date_naive();
        let mut refreshed = 0;

        for (i, region) in Region::ALL.into_iter().enumerate() {
            if i > 0 && !delay_between.is_zero() {
                tokio::time::sleep(delay_between).await;
            }

            match self.forecast(region, today, false).await {
                Ok(_) => refreshed += 1,
                Err(e) => warn!("Refresh of {} failed: {}", region, e),
            }
        }

        refreshed
    }
}
