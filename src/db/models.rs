use crate::error::{AppError, Result};
use crate::reading::{Reading, Swell, Wind};
use crate::region::Region;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct ReadingRow {
    pub id: i64,
    pub region: String,
    pub reading_date: NaiveDate,
    pub wind_speed: f64,
    pub wind_direction: String,
    pub swell_height: f64,
    pub swell_period: f64,
    pub swell_direction: f64,
    pub captured_at: DateTime<Utc>,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ReadingRow> for Reading {
    type Error = AppError;

    /// Rows go back through the validating constructors, so a corrupted row
    /// surfaces as an error instead of an out-of-range reading.
    fn try_from(row: ReadingRow) -> Result<Self> {
        let region: Region = row.region.parse()?;
        let wind = Wind::new(row.wind_speed, row.wind_direction)?;
        let swell = Swell::new(row.swell_height, row.swell_period, row.swell_direction)?;

        Ok(Reading::new(
            region,
            row.reading_date,
            wind,
            swell,
            row.captured_at,
            row.source,
        ))
    }
}
