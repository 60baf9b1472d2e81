//! Core data types for historical weather records

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// ISO calendar date format used on every external surface
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Hour at which pseudo-hourly samples derived from daily data are placed
pub const SYNTHETIC_HOUR: u32 = 12;

/// Geographic location a dataset belongs to
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4},{:.4}", self.latitude, self.longitude)
    }
}

/// Date range errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RangeError {
    #[error("Invalid ISO date: {0}")]
    InvalidDate(String),

    #[error("Start date {start} is after end date {end}")]
    Reversed { start: NaiveDate, end: NaiveDate },

    #[error("Invalid month {year}-{month}")]
    InvalidMonth { year: i32, month: u32 },
}

/// Inclusive calendar date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, RangeError> {
        if start > end {
            return Err(RangeError::Reversed { start, end });
        }
        Ok(Self { start, end })
    }

    /// Parse a range from two `YYYY-MM-DD` strings
    pub fn parse(start: &str, end: &str) -> Result<Self, RangeError> {
        Self::new(parse_date(start)?, parse_date(end)?)
    }

    /// First to last day of a calendar month
    pub fn month(year: i32, month: u32) -> Result<Self, RangeError> {
        let invalid = || RangeError::InvalidMonth { year, month };
        let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(invalid)?;
        Self::new(start, next - Duration::days(1))
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of calendar days covered, inclusive of both ends
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Pull the end back to `limit` without moving it before the start
    pub fn clamp_end(self, limit: NaiveDate) -> Self {
        if self.end <= limit {
            return self;
        }
        Self {
            start: self.start,
            end: limit.max(self.start),
        }
    }

    /// Every date in the range, ascending
    pub fn iter_days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}..{}",
            self.start.format(DATE_FORMAT),
            self.end.format(DATE_FORMAT)
        )
    }
}

/// Parse a `YYYY-MM-DD` date
pub fn parse_date(s: &str) -> Result<NaiveDate, RangeError> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|_| RangeError::InvalidDate(s.to_string()))
}

/// Numeric metrics carried by every record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    TempAvg,
    TempMin,
    TempMax,
    Precipitation,
    WindSpeed,
    Humidity,
    SunshineHours,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::TempAvg,
        Metric::TempMin,
        Metric::TempMax,
        Metric::Precipitation,
        Metric::WindSpeed,
        Metric::Humidity,
        Metric::SunshineHours,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Weather observations of one record. Absent values stay `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    #[serde(default)]
    pub temp_avg: Option<f64>,
    #[serde(default)]
    pub temp_min: Option<f64>,
    #[serde(default)]
    pub temp_max: Option<f64>,
    #[serde(default)]
    pub precipitation: Option<f64>,
    #[serde(default)]
    pub wind_speed: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub sunshine_hours: Option<f64>,
    /// WMO weather interpretation code
    #[serde(default)]
    pub weather_code: Option<i32>,
}

impl Metrics {
    pub fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::TempAvg => self.temp_avg,
            Metric::TempMin => self.temp_min,
            Metric::TempMax => self.temp_max,
            Metric::Precipitation => self.precipitation,
            Metric::WindSpeed => self.wind_speed,
            Metric::Humidity => self.humidity,
            Metric::SunshineHours => self.sunshine_hours,
        }
    }
}

/// One calendar day at a location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub metrics: Metrics,
}

impl DailyRecord {
    pub fn new(date: NaiveDate, metrics: Metrics) -> Self {
        Self { date, metrics }
    }
}

/// One hour at a location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyRecord {
    pub date: NaiveDate,
    pub hour: u32,
    pub timestamp: NaiveDateTime,
    #[serde(flatten)]
    pub metrics: Metrics,
    /// Set when the sample replicates a daily value at noon
    #[serde(default)]
    pub is_synthetic_from_daily: bool,
}

impl HourlyRecord {
    /// Build an hourly record; returns `None` for an hour outside 0..=23
    pub fn new(date: NaiveDate, hour: u32, metrics: Metrics) -> Option<Self> {
        let time = NaiveTime::from_hms_opt(hour, 0, 0)?;
        Some(Self {
            date,
            hour,
            timestamp: date.and_time(time),
            metrics,
            is_synthetic_from_daily: false,
        })
    }

    /// Build from a full timestamp, truncating to the hour
    pub fn at(timestamp: NaiveDateTime, metrics: Metrics) -> Option<Self> {
        use chrono::Timelike;
        Self::new(timestamp.date(), timestamp.hour(), metrics)
    }

    /// Replicate a daily value as a single noon sample
    pub fn from_daily(daily: &DailyRecord) -> Self {
        let noon = NaiveTime::from_hms_opt(SYNTHETIC_HOUR, 0, 0).unwrap_or(NaiveTime::MIN);
        Self {
            date: daily.date,
            hour: SYNTHETIC_HOUR,
            timestamp: daily.date.and_time(noon),
            metrics: daily.metrics,
            is_synthetic_from_daily: true,
        }
    }
}

/// A record that can be placed on a time axis
pub trait Observation {
    fn timestamp(&self) -> NaiveDateTime;
    fn metrics(&self) -> &Metrics;

    fn date(&self) -> NaiveDate {
        self.timestamp().date()
    }
}

impl Observation for DailyRecord {
    fn timestamp(&self) -> NaiveDateTime {
        self.date.and_time(NaiveTime::MIN)
    }

    fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    fn date(&self) -> NaiveDate {
        self.date
    }
}

impl Observation for HourlyRecord {
    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    fn date(&self) -> NaiveDate {
        self.date
    }
}

/// One granularity bucket reduced to a summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedBucket {
    /// Bucket identity as produced by the granularity key function
    pub key: String,
    /// Date of the first member
    pub date: NaiveDate,
    /// Hour of the first member, for hour buckets only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hour: Option<u32>,
    pub temp_avg: Option<f64>,
    pub temp_min: Option<f64>,
    pub temp_max: Option<f64>,
    pub precipitation: Option<f64>,
    pub sunshine_hours: Option<f64>,
    pub wind_speed: Option<f64>,
    pub humidity: Option<f64>,
    /// Most severe weather code among members
    pub weather_code: Option<i32>,
    pub sample_count: usize,
}

impl AggregatedBucket {
    pub fn year(&self) -> i32 {
        self.date.year()
    }

    /// Timestamp of the first member, at midnight unless hour-bucketed
    pub fn start(&self) -> NaiveDateTime {
        let time = self
            .hour
            .and_then(|h| NaiveTime::from_hms_opt(h, 0, 0))
            .unwrap_or(NaiveTime::MIN);
        self.date.and_time(time)
    }
}
