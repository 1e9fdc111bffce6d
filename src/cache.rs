//! Short-lived key/value cache in front of the reading store.

use crate::error::Result;
use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use std::time::{Duration, Instant};

/// Key holding the JSON map of today's readings for every region.
pub const ALL_REGIONS_KEY: &str = "all_regions_conditions";

const MAX_ENTRIES: u64 = 1000;

/// Values are JSON strings; callers own the encoding.
///
/// Errors map to [`crate::error::AppError::CacheUnavailable`]. Callers treat
/// them as a miss.
#[async_trait]
pub trait ConditionsCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;
}

#[derive(Clone)]
struct Cached {
    value: String,
    ttl: Duration,
}

/// Each entry lives for the TTL it was last written with.
struct PerEntryTtl;

impl Expiry<String, Cached> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, value: &Cached, _at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Cached,
        _at: Instant,
        _remaining: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process TTL cache backed by moka.
#[derive(Clone)]
pub struct MemoryCache {
    inner: Cache<String, Cached>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(MAX_ENTRIES)
                .expire_after(PerEntryTtl)
                .build(),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConditionsCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.inner.get(key).await.map(|cached| cached.value))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        self.inner
            .insert(key.to_string(), Cached { value, ttl })
            .await;
        Ok(())
    }
}
