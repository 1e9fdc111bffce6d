//! Normalized forecast snapshot shared by every source, the store and the cache.

use crate::error::{AppError, Result};
use crate::region::Region;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

const CARDINAL_8: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];

const COMPASS_16: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    /// km/h
    pub speed: f64,
    /// Compass label, e.g. "SW"
    pub direction: String,
}

impl Wind {
    pub fn new(speed: f64, direction: impl Into<String>) -> Result<Self> {
        if !speed.is_finite() || speed < 0.0 {
            return Err(AppError::InvalidData(format!(
                "Wind speed must be a non-negative number, got {}",
                speed
            )));
        }

        let direction = direction.into().trim().to_string();
        if direction.is_empty() {
            return Err(AppError::InvalidData(
                "Wind direction cannot be empty".to_string(),
            ));
        }

        Ok(Self { speed, direction })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Swell {
    /// Meters
    pub height: f64,
    /// Seconds
    pub period: f64,
    /// Degrees in [0, 360)
    pub direction: f64,
    pub cardinal_direction: String,
}

impl Swell {
    pub fn new(height: f64, period: f64, direction: f64) -> Result<Self> {
        if !height.is_finite() || height < 0.0 {
            return Err(AppError::InvalidData(format!(
                "Swell height must be a non-negative number, got {}",
                height
            )));
        }

        if !period.is_finite() || period < 0.0 {
            return Err(AppError::InvalidData(format!(
                "Swell period must be a non-negative number, got {}",
                period
            )));
        }

        if !direction.is_finite() {
            return Err(AppError::InvalidData(format!(
                "Swell direction must be a finite number, got {}",
                direction
            )));
        }

        let direction = normalize_degrees(direction);

        Ok(Self {
            height,
            period,
            direction,
            cardinal_direction: cardinal_direction(direction).to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub region: Region,
    pub date: NaiveDate,
    pub wind: Wind,
    pub swell: Swell,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub captured_at: DateTime<Utc>,
    pub source: String,
}

impl Reading {
    pub fn new(
        region: Region,
        date: NaiveDate,
        wind: Wind,
        swell: Swell,
        captured_at: DateTime<Utc>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            region,
            date,
            wind,
            swell,
            captured_at,
            source: source.into(),
        }
    }

    /// Epoch milliseconds of the capture.
    pub fn timestamp(&self) -> i64 {
        self.captured_at.timestamp_millis()
    }
}

/// Fold any finite angle into [0, 360).
pub fn normalize_degrees(degrees: f64) -> f64 {
    let normalized = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if normalized >= 360.0 {
        0.0
    } else {
        normalized
    }
}

/// 8-point compass label, 45° per bucket, rounding to the nearest point.
pub fn cardinal_direction(degrees: f64) -> &'static str {
    let normalized = normalize_degrees(degrees);
    let bucket = ((normalized + 22.5) / 45.0).floor() as usize % CARDINAL_8.len();
    CARDINAL_8[bucket]
}

/// True for any 16-point compass label ("N", "NNE", ..., "NNW").
pub fn is_compass_label(s: &str) -> bool {
    COMPASS_16.contains(&s.trim().to_ascii_uppercase().as_str())
}
