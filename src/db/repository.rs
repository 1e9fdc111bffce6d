use crate::db::models::ReadingRow;
use crate::db::ReadingStore;
use crate::error::{AppError, Result};
use crate::reading::Reading;
use crate::region::Region;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::{debug, info, warn};

const READING_COLUMNS: &str = "id, region, reading_date, wind_speed, wind_direction, \
     swell_height, swell_period, swell_direction, captured_at, source, created_at";

pub struct Repository {
    pool: PgPool,
}

impl Repository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Number of rows ever captured for the key, superseded ones included.
    pub async fn count_captures(&self, region: Region, date: NaiveDate) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM readings WHERE region = $1 AND reading_date = $2",
        )
        .bind(region.name())
        .bind(date)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

#[async_trait]
impl ReadingStore for Repository {
    async fn get(&self, region: Region, date: NaiveDate) -> Result<Option<Reading>> {
        let row = sqlx::query_as::<_, ReadingRow>(&format!(
            "SELECT {} FROM readings \
             WHERE region = $1 AND reading_date = $2 \
             ORDER BY captured_at DESC, id DESC \
             LIMIT 1",
            READING_COLUMNS
        ))
        .bind(region.name())
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        // A row that no longer validates is a store fault, not a bad request
        row.map(|row| {
            let id = row.id;
            Reading::try_from(row).map_err(|e| {
                AppError::StoreUnavailable(format!("Unreadable reading row {}: {}", id, e))
            })
        })
        .transpose()
    }

    async fn put(&self, reading: &Reading) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO readings
                (region, reading_date, wind_speed, wind_direction,
                 swell_height, swell_period, swell_direction, captured_at, source)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(reading.region.name())
        .bind(reading.date)
        .bind(reading.wind.speed)
        .bind(&reading.wind.direction)
        .bind(reading.swell.height)
        .bind(reading.swell.period)
        .bind(reading.swell.direction)
        .bind(reading.captured_at)
        .bind(&reading.source)
        .execute(&self.pool)
        .await?;

        debug!(
            "Stored {} reading for {} on {}",
            reading.source, reading.region, reading.date
        );
        Ok(())
    }

    async fn latest_for_date(&self, date: NaiveDate) -> Result<Vec<Reading>> {
        let rows = sqlx::query_as::<_, ReadingRow>(&format!(
            "SELECT DISTINCT ON (region) {} FROM readings \
             WHERE reading_date = $1 \
             ORDER BY region, captured_at DESC, id DESC",
            READING_COLUMNS
        ))
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        // One bad row shouldn't hide every other region
        let readings = rows
            .into_iter()
            .filter_map(|row| {
                let id = row.id;
                match Reading::try_from(row) {
                    Ok(reading) => Some(reading),
                    Err(e) => {
                        warn!("Skipping unreadable reading row {}: {}", id, e);
                        None
                    }
                }
            })
            .collect();

        Ok(readings)
    }
}
