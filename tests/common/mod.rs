#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use swell_forecast::cache::ConditionsCache;
use swell_forecast::db::ReadingStore;
use swell_forecast::error::{AppError, Result};
use swell_forecast::orchestrator::ForecastService;
use swell_forecast::reading::{Reading, Swell, Wind};
use swell_forecast::region::Region;
use swell_forecast::sources::ForecastSource;

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn hours_ago(hours: i64) -> DateTime<Utc> {
    Utc::now() - ChronoDuration::hours(hours)
}

pub fn reading(
    region: Region,
    date: NaiveDate,
    captured_at: DateTime<Utc>,
    swell_height: f64,
    source: &str,
) -> Reading {
    Reading::new(
        region,
        date,
        Wind::new(12.0, "SE").unwrap(),
        Swell::new(swell_height, 12.0, 225.0).unwrap(),
        captured_at,
        source,
    )
}

/// Source that either returns fixed conditions or fails, counting calls.
pub struct FakeSource {
    name: String,
    swell_height: Option<f64>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FakeSource {
    pub fn succeeding(name: &str, swell_height: f64) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            swell_height: Some(swell_height),
            delay: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            swell_height: None,
            delay: None,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn slow(name: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            swell_height: Some(9.9),
            delay: Some(delay),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ForecastSource for FakeSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, region: Region) -> Result<Reading> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.swell_height {
            Some(height) => Ok(reading(region, today(), Utc::now(), height, &self.name)),
            None => Err(AppError::source_unavailable(&self.name, "scripted failure")),
        }
    }
}

/// Append-only in-memory store with switchable failures.
#[derive(Default)]
pub struct FakeStore {
    rows: Mutex<Vec<Reading>>,
    puts: AtomicUsize,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Insert without counting as a `put`.
    pub fn seed(&self, reading: Reading) {
        self.rows.lock().unwrap().push(reading);
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReadingStore for FakeStore {
    async fn get(&self, region: Region, date: NaiveDate) -> Result<Option<Reading>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::StoreUnavailable("connection refused".to_string()));
        }
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.region == region && r.date == date)
            .max_by_key(|r| r.captured_at)
            .cloned())
    }

    async fn put(&self, reading: &Reading) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::StoreUnavailable("read-only replica".to_string()));
        }
        self.rows.lock().unwrap().push(reading.clone());
        Ok(())
    }

    async fn latest_for_date(&self, date: NaiveDate) -> Result<Vec<Reading>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::StoreUnavailable("connection refused".to_string()));
        }
        let mut latest: HashMap<Region, Reading> = HashMap::new();
        for row in self.rows.lock().unwrap().iter().filter(|r| r.date == date) {
            match latest.get(&row.region) {
                Some(existing) if existing.captured_at >= row.captured_at => {}
                _ => {
                    latest.insert(row.region, row.clone());
                }
            }
        }
        Ok(latest.into_values().collect())
    }
}

/// Cache that remembers every `set` (TTL included) and can be made to fail.
#[derive(Default)]
pub struct FakeCache {
    entries: Mutex<HashMap<String, String>>,
    sets: Mutex<Vec<(String, String, Duration)>>,
    pub fail_get: AtomicBool,
    pub fail_set: AtomicBool,
}

impl FakeCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let cache = Self::default();
        cache.fail_get.store(true, Ordering::SeqCst);
        cache.fail_set.store(true, Ordering::SeqCst);
        Arc::new(cache)
    }

    pub fn sets(&self) -> Vec<(String, String, Duration)> {
        self.sets.lock().unwrap().clone()
    }

    pub fn preload(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }
}

#[async_trait]
impl ConditionsCache for FakeCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(AppError::CacheUnavailable("cache down".to_string()));
        }
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        self.sets
            .lock()
            .unwrap()
            .push((key.to_string(), value.clone(), ttl));
        if self.fail_set.load(Ordering::SeqCst) {
            return Err(AppError::CacheUnavailable("cache down".to_string()));
        }
        self.entries.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }
}

pub fn service(
    store: &Arc<FakeStore>,
    cache: &Arc<FakeCache>,
    sources: &[Arc<FakeSource>],
) -> ForecastService {
    ForecastService::new(
        store.clone(),
        cache.clone(),
        sources
            .iter()
            .map(|s| s.clone() as Arc<dyn ForecastSource>)
            .collect(),
    )
}
