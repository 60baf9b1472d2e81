//! Adapter for an injected weather data service

use anyhow::{bail, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use wxhist_core::{
    parse_date, DailyRecord, DataSource, DateRange, HourlyRecord, Location, Metrics, SourceKind,
};

/// Daily record as delivered by a weather service, before validation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDailyRecord {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(flatten)]
    pub metrics: Metrics,
}

/// Hourly record as delivered by a weather service, before validation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawHourlyRecord {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub hour: Option<u32>,
    #[serde(flatten)]
    pub metrics: Metrics,
}

/// Hourly history response of a weather service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HourlyHistory {
    pub hourly: Vec<RawHourlyRecord>,
    pub source: String,
    #[serde(default)]
    pub error: Option<String>,
}

/// The application's weather data service
#[async_trait::async_trait]
pub trait WeatherService: Send + Sync {
    async fn load_history(
        &self,
        latitude: f64,
        longitude: f64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawDailyRecord>>;

    async fn load_hourly_history(
        &self,
        latitude: f64,
        longitude: f64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<HourlyHistory>;
}

/// Validate raw daily records: records without a parsable date are dropped,
/// the rest are sorted by date with the first occurrence of a date kept.
pub fn normalize_daily(raw: Vec<RawDailyRecord>) -> Vec<DailyRecord> {
    let total = raw.len();
    let mut records: Vec<DailyRecord> = raw
        .into_iter()
        .filter_map(|r| {
            let date = parse_date(r.date.as_deref()?).ok()?;
            Some(DailyRecord::new(date, r.metrics))
        })
        .collect();

    records.sort_by_key(|r| r.date);
    records.dedup_by_key(|r| r.date);

    if records.len() < total {
        debug!(
            dropped = total - records.len(),
            "Dropped malformed or duplicate daily records"
        );
    }
    records
}

/// Validate raw hourly records, keyed by their timestamp or by (date, hour)
pub fn normalize_hourly(raw: Vec<RawHourlyRecord>) -> Vec<HourlyRecord> {
    let total = raw.len();
    let mut records: Vec<HourlyRecord> = raw.into_iter().filter_map(hourly_from_raw).collect();

    records.sort_by_key(|r| r.timestamp);
    records.dedup_by_key(|r| r.timestamp);

    if records.len() < total {
        debug!(
            dropped = total - records.len(),
            "Dropped malformed or duplicate hourly records"
        );
    }
    records
}

fn hourly_from_raw(raw: RawHourlyRecord) -> Option<HourlyRecord> {
    if let Some(ts) = raw.timestamp.as_deref().and_then(parse_timestamp) {
        return HourlyRecord::at(ts, raw.metrics);
    }
    let date = parse_date(raw.date.as_deref()?).ok()?;
    HourlyRecord::new(date, raw.hour?, raw.metrics)
}

/// Parse an ISO-8601 local timestamp with or without seconds
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M"))
        .ok()
}

/// Data source backed by the injected weather service
pub struct PrimarySource {
    service: Arc<dyn WeatherService>,
}

impl PrimarySource {
    pub fn new(service: Arc<dyn WeatherService>) -> Self {
        Self { service }
    }
}

#[async_trait::async_trait]
impl DataSource for PrimarySource {
    fn kind(&self) -> SourceKind {
        SourceKind::PrimaryService
    }

    async fn fetch_daily(&self, location: &Location, range: &DateRange) -> Result<Vec<DailyRecord>> {
        let raw = self
            .service
            .load_history(
                location.latitude,
                location.longitude,
                range.start(),
                range.end(),
            )
            .await?;
        Ok(normalize_daily(raw))
    }

    async fn fetch_hourly(
        &self,
        location: &Location,
        range: &DateRange,
    ) -> Result<Vec<HourlyRecord>> {
        let history = self
            .service
            .load_hourly_history(
                location.latitude,
                location.longitude,
                range.start(),
                range.end(),
            )
            .await?;

        if let Some(error) = history.error {
            bail!("weather service ({}) reported: {}", history.source, error);
        }
        Ok(normalize_hourly(history.hourly))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(date: Option<&str>, temp: f64) -> RawDailyRecord {
        RawDailyRecord {
            date: date.map(str::to_string),
            metrics: Metrics {
                temp_avg: Some(temp),
                ..Metrics::default()
            },
        }
    }

    #[test]
    fn test_normalize_drops_records_without_date() {
        let records = normalize_daily(vec![
            raw(Some("2024-01-02"), 2.0),
            raw(None, 99.0),
            raw(Some("not-a-date"), 99.0),
            raw(Some("2024-01-01"), 1.0),
            raw(Some("2024-01-01"), 5.0),
        ]);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].date.to_string(), "2024-01-01");
        assert_eq!(records[0].metrics.temp_avg, Some(1.0));
        assert_eq!(records[1].metrics.temp_avg, Some(2.0));
    }

    #[test]
    fn test_normalize_hourly_shapes() {
        let records = normalize_hourly(vec![
            RawHourlyRecord {
                timestamp: Some("2024-01-01T05:00".to_string()),
                ..RawHourlyRecord::default()
            },
            RawHourlyRecord {
                date: Some("2024-01-01".to_string()),
                hour: Some(3),
                ..RawHourlyRecord::default()
            },
            RawHourlyRecord {
                date: Some("2024-01-01".to_string()),
                hour: None,
                ..RawHourlyRecord::default()
            },
        ]);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].hour, 3);
        assert_eq!(records[1].hour, 5);
        assert!(!records[1].is_synthetic_from_daily);
    }

    #[test]
    fn test_raw_record_deserializes_camel_case() {
        let json = r#"[{"date":"2024-05-01","tempMax":21.5,"sunshineHours":9.1},{"tempAvg":3.0}]"#;
        let raw: Vec<RawDailyRecord> = serde_json::from_str(json).unwrap();
        let records = normalize_daily(raw);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].metrics.temp_max, Some(21.5));
        assert_eq!(records[0].metrics.sunshine_hours, Some(9.1));
    }

    struct FailingHourly;

    #[async_trait::async_trait]
    impl WeatherService for FailingHourly {
        async fn load_history(
            &self,
            _: f64,
            _: f64,
            _: NaiveDate,
            _: NaiveDate,
        ) -> Result<Vec<RawDailyRecord>> {
            Ok(vec![raw(Some("2024-01-01"), 1.0)])
        }

        async fn load_hourly_history(
            &self,
            _: f64,
            _: f64,
            _: NaiveDate,
            _: NaiveDate,
        ) -> Result<HourlyHistory> {
            Ok(HourlyHistory {
                hourly: Vec::new(),
                source: "station".to_string(),
                error: Some("quota exceeded".to_string()),
            })
        }
    }

    #[tokio::test]
    async fn test_reported_hourly_error_is_a_failure() {
        let source = PrimarySource::new(Arc::new(FailingHourly));
        let location = Location::new(52.52, 13.41);
        let range = DateRange::parse("2024-01-01", "2024-01-01").unwrap();

        assert_eq!(source.fetch_daily(&location, &range).await.unwrap().len(), 1);
        let err = source.fetch_hourly(&location, &range).await.unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }
}
