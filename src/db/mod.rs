pub mod models;
pub mod repository;

use crate::error::Result;
use crate::reading::Reading;
use crate::region::Region;
use async_trait::async_trait;
use chrono::NaiveDate;

pub use repository::Repository;

/// Durable, append-only storage of readings keyed by (region, date).
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// The most recently captured reading for the key, if any.
    async fn get(&self, region: Region, date: NaiveDate) -> Result<Option<Reading>>;

    /// Insert a new row. Existing rows are never updated.
    async fn put(&self, reading: &Reading) -> Result<()>;

    /// The most recently captured reading of every region that has one for `date`.
    async fn latest_for_date(&self, date: NaiveDate) -> Result<Vec<Reading>>;
}
