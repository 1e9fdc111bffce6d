//! Provider payload parsing.
//!
//! Both providers are parsed into [`ParsedConditions`] and only then turned
//! into a validated [`Reading`]. Nothing the provider sends crosses this
//! boundary unparsed, and any field that cannot be identified confidently
//! fails the whole parse.

use crate::error::{AppError, Result};
use crate::reading::{cardinal_direction, is_compass_label, Reading, Swell, Wind};
use crate::region::Region;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use scraper::{Html, Selector};
use serde::Deserialize;
use std::ops::RangeInclusive;
use tracing::debug;

const SWELL_HEIGHT_RANGE: RangeInclusive<f64> = 0.0..=15.0;
const SWELL_PERIOD_RANGE: RangeInclusive<f64> = 3.0..=30.0;
const DEGREES_RANGE: RangeInclusive<f64> = 0.0..=360.0;
const WIND_SPEED_RANGE: RangeInclusive<f64> = 0.0..=250.0;

/// How far a marine `current` timestamp may sit from now and still count as
/// current conditions.
pub const MAX_OBSERVATION_SKEW_HOURS: i64 = 3;

/// Provider-agnostic values extracted from a payload, not yet validated.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedConditions {
    pub swell_height: f64,
    pub swell_period: f64,
    pub swell_direction: f64,
    pub wind_speed: f64,
    pub wind_direction: String,
}

impl ParsedConditions {
    pub fn into_reading(
        self,
        region: Region,
        date: NaiveDate,
        captured_at: DateTime<Utc>,
        source: &str,
    ) -> Result<Reading> {
        let wind = Wind::new(self.wind_speed, self.wind_direction)?;
        let swell = Swell::new(self.swell_height, self.swell_period, self.swell_direction)?;
        Ok(Reading::new(region, date, wind, swell, captured_at, source))
    }
}

/// A grid cell's text interpreted by its shape alone.
#[derive(Debug, Clone, PartialEq)]
enum CellValue {
    Decimal(f64),
    Integer(f64),
    Degrees(f64),
    Speed(f64),
    Compass(String),
    Other,
}

#[derive(Debug, Clone)]
struct GridCell {
    top: f64,
    left: f64,
    value: CellValue,
}

pub struct SwellTableParser;

impl SwellTableParser {
    /// Parse a swell-table page whose forecast grid is laid out as absolutely
    /// positioned `div.cell` elements.
    ///
    /// Only the left-most column (the current time step) is read, top to bottom:
    /// - swell height: first unitless decimal within 0-15 m
    /// - swell period: first unitless integer within 3-30 s
    /// - swell direction: first `°` value within 0-360
    /// - wind speed: first `km/h` value
    /// - wind direction: first compass label
    pub fn parse(html: &str) -> Result<ParsedConditions> {
        let cells = Self::extract_cells(html)?;

        let min_left = cells
            .iter()
            .map(|c| c.left)
            .fold(f64::INFINITY, f64::min);

        let mut column: Vec<&GridCell> = cells
            .iter()
            .filter(|c| (c.left - min_left).abs() < 0.5)
            .collect();
        column.sort_by(|a, b| a.top.total_cmp(&b.top));

        debug!(
            "Swell table: {} positioned cells, {} in current column",
            cells.len(),
            column.len()
        );

        let swell_height = first_match(&column, "swell height", |v| match v {
            CellValue::Decimal(n) if SWELL_HEIGHT_RANGE.contains(n) => Some(*n),
            _ => None,
        })?;

        let swell_period = first_match(&column, "swell period", |v| match v {
            CellValue::Integer(n) if SWELL_PERIOD_RANGE.contains(n) => Some(*n),
            _ => None,
        })?;

        let swell_direction = first_match(&column, "swell direction", |v| match v {
            CellValue::Degrees(n) if DEGREES_RANGE.contains(n) => Some(*n),
            _ => None,
        })?;

        let wind_speed = first_match(&column, "wind speed", |v| match v {
            CellValue::Speed(n) if WIND_SPEED_RANGE.contains(n) => Some(*n),
            _ => None,
        })?;

        let wind_direction = first_match(&column, "wind direction", |v| match v {
            CellValue::Compass(label) => Some(label.clone()),
            _ => None,
        })?;

        Ok(ParsedConditions {
            swell_height,
            swell_period,
            swell_direction,
            wind_speed,
            wind_direction,
        })
    }

    fn extract_cells(html: &str) -> Result<Vec<GridCell>> {
        let document = Html::parse_document(html);
        let selector = Selector::parse("div.cell")
            .map_err(|e| AppError::Parse(format!("Selector error: {:?}", e)))?;

        let cells: Vec<GridCell> = document
            .select(&selector)
            .filter_map(|element| {
                let style = element.value().attr("style")?;
                let top = style_offset(style, "top")?;
                let left = style_offset(style, "left")?;
                let text: String = element.text().collect();
                Some(GridCell {
                    top,
                    left,
                    value: classify(&text),
                })
            })
            .collect();

        if cells.is_empty() {
            return Err(AppError::Parse(
                "No positioned forecast cells found in page".to_string(),
            ));
        }

        Ok(cells)
    }
}

fn first_match<T>(
    column: &[&GridCell],
    field: &str,
    pick: impl Fn(&CellValue) -> Option<T>,
) -> Result<T> {
    column
        .iter()
        .find_map(|cell| pick(&cell.value))
        .ok_or_else(|| AppError::Parse(format!("Could not identify {} in forecast grid", field)))
}

/// Read a `<prop>: <n>px` declaration out of an inline style attribute.
fn style_offset(style: &str, prop: &str) -> Option<f64> {
    style.split(';').find_map(|decl| {
        let (name, value) = decl.split_once(':')?;
        if !name.trim().eq_ignore_ascii_case(prop) {
            return None;
        }
        value.trim().trim_end_matches("px").trim().parse::<f64>().ok()
    })
}

fn classify(text: &str) -> CellValue {
    let text = text.trim();
    if text.is_empty() {
        return CellValue::Other;
    }

    if let Some(number) = text.strip_suffix("km/h") {
        return parse_number(number).map_or(CellValue::Other, CellValue::Speed);
    }

    if let Some(number) = text.strip_suffix('°') {
        return parse_number(number).map_or(CellValue::Other, CellValue::Degrees);
    }

    if is_compass_label(text) {
        return CellValue::Compass(text.to_ascii_uppercase());
    }

    match parse_number(text) {
        Some(n) if text.contains('.') => CellValue::Decimal(n),
        Some(n) => CellValue::Integer(n),
        None => CellValue::Other,
    }
}

fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Response body of the marine conditions API.
#[derive(Debug, Deserialize)]
pub struct MarinePayload {
    pub current: Option<MarineCurrent>,
}

#[derive(Debug, Deserialize)]
pub struct MarineCurrent {
    pub time: Option<String>,
    pub swell_wave_height: Option<f64>,
    pub swell_wave_period: Option<f64>,
    pub swell_wave_direction: Option<f64>,
    pub wind_speed_10m: Option<f64>,
    pub wind_direction_10m: Option<f64>,
}

impl MarinePayload {
    /// `now` is compared against the payload's observation time; a block
    /// that is not current is rejected rather than stamped as today.
    pub fn into_conditions(self, now: DateTime<Utc>) -> Result<ParsedConditions> {
        let current = self.current.ok_or_else(|| {
            AppError::Parse("Marine payload has no 'current' block".to_string())
        })?;

        let observed_at = current
            .time
            .as_deref()
            .ok_or_else(|| AppError::Parse("Marine payload missing 'time'".to_string()))
            .and_then(parse_observation_time)?;
        let max_skew = Duration::hours(MAX_OBSERVATION_SKEW_HOURS);
        let age = now - observed_at;
        if age > max_skew || age < -max_skew {
            return Err(AppError::InvalidData(format!(
                "Marine observation at {} is not current",
                observed_at
            )));
        }

        let wind_direction_degrees = required(current.wind_direction_10m, "wind_direction_10m")?;
        if !DEGREES_RANGE.contains(&wind_direction_degrees) {
            return Err(AppError::InvalidData(format!(
                "wind_direction_10m {} out of range 0-360",
                wind_direction_degrees
            )));
        }

        Ok(ParsedConditions {
            swell_height: required(current.swell_wave_height, "swell_wave_height")?,
            swell_period: required(current.swell_wave_period, "swell_wave_period")?,
            swell_direction: required(current.swell_wave_direction, "swell_wave_direction")?,
            wind_speed: required(current.wind_speed_10m, "wind_speed_10m")?,
            wind_direction: cardinal_direction(wind_direction_degrees).to_string(),
        })
    }
}

/// Observation times come as GMT without an offset, e.g. `2024-06-01T10:00`.
fn parse_observation_time(text: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| AppError::Parse(format!("Unrecognised marine observation time '{}'", text)))
}

fn required(value: Option<f64>, field: &str) -> Result<f64> {
    match value {
        Some(v) if v.is_finite() => Ok(v),
        Some(v) => Err(AppError::InvalidData(format!("{} is not finite: {}", field, v))),
        None => Err(AppError::Parse(format!("Marine payload missing '{}'", field))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn cell(top: u32, left: u32, text: &str) -> String {
        format!(
            r#"<div class="cell" style="position:absolute; top: {}px; left: {}px">{}</div>"#,
            top, left, text
        )
    }

    fn page(cells: &[String]) -> String {
        format!(
            "<html><body><div class=\"grid\">{}</div></body></html>",
            cells.concat()
        )
    }

    #[test]
    fn test_style_offset() {
        assert_eq!(style_offset("position:absolute; top: 40px; left:12px", "top"), Some(40.0));
        assert_eq!(style_offset("position:absolute; top: 40px; left:12px", "left"), Some(12.0));
        assert_eq!(style_offset("position:absolute", "top"), None);
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("1.8"), CellValue::Decimal(1.8));
        assert_eq!(classify("12"), CellValue::Integer(12.0));
        assert_eq!(classify("225°"), CellValue::Degrees(225.0));
        assert_eq!(classify("18km/h"), CellValue::Speed(18.0));
        assert_eq!(classify("ssw"), CellValue::Compass("SSW".to_string()));
        assert_eq!(classify("N/A"), CellValue::Other);
        assert_eq!(classify(""), CellValue::Other);
    }

    #[test]
    fn test_parse_reads_first_column_only() {
        let html = page(&[
            // next time step, further right
            cell(10, 200, "3.4"),
            cell(20, 200, "16"),
            cell(30, 200, "270°"),
            cell(40, 200, "40km/h"),
            cell(50, 200, "W"),
            // current time step, deliberately out of vertical order
            cell(50, 100, "SE"),
            cell(10, 100, "1.8"),
            cell(30, 100, "225°"),
            cell(20, 100, "12"),
            cell(40, 100, "18km/h"),
        ]);

        let parsed = SwellTableParser::parse(&html).unwrap();
        assert_eq!(
            parsed,
            ParsedConditions {
                swell_height: 1.8,
                swell_period: 12.0,
                swell_direction: 225.0,
                wind_speed: 18.0,
                wind_direction: "SE".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_skips_out_of_range_values() {
        let html = page(&[
            cell(0, 0, "2024"),
            cell(5, 0, "42.5"),
            cell(10, 0, "2.1"),
            cell(15, 0, "1"),
            cell(20, 0, "14"),
            cell(30, 0, "190°"),
            cell(40, 0, "9km/h"),
            cell(50, 0, "NNE"),
        ]);

        let parsed = SwellTableParser::parse(&html).unwrap();
        assert_eq!(parsed.swell_height, 2.1);
        assert_eq!(parsed.swell_period, 14.0);
        assert_eq!(parsed.wind_direction, "NNE");
    }

    #[test]
    fn test_parse_fails_closed_on_missing_field() {
        let html = page(&[
            cell(10, 0, "1.8"),
            cell(20, 0, "12"),
            cell(30, 0, "225°"),
            cell(50, 0, "SE"),
        ]);

        let err = SwellTableParser::parse(&html).unwrap_err();
        assert!(err.to_string().contains("wind speed"));
    }

    #[test]
    fn test_parse_rejects_page_without_grid() {
        let err = SwellTableParser::parse("<html><body><p>Maintenance</p></body></html>")
            .unwrap_err();
        assert!(err.to_string().contains("No positioned forecast cells"));
    }

    fn observed(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_marine_payload() {
        let payload: MarinePayload = serde_json::from_str(
            r#"{"current":{"time":"2024-06-01T10:00","swell_wave_height":1.6,
                "swell_wave_period":11.0,"swell_wave_direction":230.0,
                "wind_speed_10m":14.0,"wind_direction_10m":135.0}}"#,
        )
        .unwrap();

        let parsed = payload.into_conditions(observed(11)).unwrap();
        assert_eq!(parsed.swell_height, 1.6);
        assert_eq!(parsed.swell_direction, 230.0);
        assert_eq!(parsed.wind_direction, "SE");
    }

    #[test]
    fn test_marine_payload_missing_field() {
        let payload: MarinePayload = serde_json::from_str(
            r#"{"current":{"time":"2024-06-01T10:00","swell_wave_height":1.6,
                "swell_wave_period":null,"swell_wave_direction":230.0,
                "wind_speed_10m":14.0,"wind_direction_10m":135.0}}"#,
        )
        .unwrap();

        let err = payload.into_conditions(observed(10)).unwrap_err();
        assert!(err.to_string().contains("swell_wave_period"));
    }

    #[test]
    fn test_marine_payload_without_current_block() {
        let payload: MarinePayload = serde_json::from_str(r#"{"error":true}"#).unwrap();
        assert!(payload.into_conditions(observed(10)).is_err());
    }

    #[test]
    fn test_marine_payload_rejects_stale_observation() {
        let payload: MarinePayload = serde_json::from_str(
            r#"{"current":{"time":"2024-05-31T10:00","swell_wave_height":1.6,
                "swell_wave_period":11.0,"swell_wave_direction":230.0,
                "wind_speed_10m":14.0,"wind_direction_10m":135.0}}"#,
        )
        .unwrap();

        let err = payload.into_conditions(observed(10)).unwrap_err();
        assert!(matches!(err, AppError::InvalidData(_)));
        assert!(err.to_string().contains("not current"));
    }

    #[test]
    fn test_marine_payload_requires_observation_time() {
        let payload: MarinePayload = serde_json::from_str(
            r#"{"current":{"swell_wave_height":1.6,"swell_wave_period":11.0,
                "swell_wave_direction":230.0,"wind_speed_10m":14.0,"wind_direction_10m":135.0}}"#,
        )
        .unwrap();

        let err = payload.into_conditions(observed(10)).unwrap_err();
        assert!(err.to_string().contains("'time'"));
    }

    #[test]
    fn test_observation_time_formats() {
        assert_eq!(parse_observation_time("2024-06-01T10:00").unwrap(), observed(10));
        assert_eq!(parse_observation_time("2024-06-01T10:00:00").unwrap(), observed(10));
        assert_eq!(
            parse_observation_time("2024-06-01T12:00:00+02:00").unwrap(),
            observed(10)
        );
        assert!(parse_observation_time("yesterday").is_err());
    }

    #[test]
    fn test_into_reading_rejects_negative_height() {
        let parsed = ParsedConditions {
            swell_height: -1.0,
            swell_period: 10.0,
            swell_direction: 180.0,
            wind_speed: 5.0,
            wind_direction: "S".to_string(),
        };
        let result = parsed.into_reading(
            Region::FalseBay,
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            Utc::now(),
            "test",
        );
        assert!(matches!(result, Err(AppError::InvalidData(_))));
    }
}
