//! Direct queries against the Open-Meteo historical archive

use crate::primary::parse_timestamp;
use crate::{FetchError, FetchResult};
use anyhow::Result;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;
use wxhist_core::{
    parse_date, DailyRecord, DataSource, DateRange, HourlyRecord, Location, Metrics, SourceKind,
    DATE_FORMAT,
};

const DAILY_FIELDS: &[&str] = &[
    "temperature_2m_mean",
    "temperature_2m_min",
    "temperature_2m_max",
    "precipitation_sum",
    "wind_speed_10m_max",
    "relative_humidity_2m_mean",
    "sunshine_duration",
    "weather_code",
];

const HOURLY_FIELDS: &[&str] = &[
    "temperature_2m",
    "precipitation",
    "wind_speed_10m",
    "relative_humidity_2m",
    "sunshine_duration",
    "weather_code",
];

const SECONDS_PER_HOUR: f64 = 3600.0;

#[derive(Debug, Deserialize)]
struct ArchiveResponse {
    #[serde(default)]
    daily: Option<DailyColumns>,
    #[serde(default)]
    hourly: Option<HourlyColumns>,
}

#[derive(Debug, Deserialize)]
struct ArchiveErrorBody {
    #[serde(default)]
    reason: Option<String>,
}

/// Parallel arrays indexed by `time`
#[derive(Debug, Default, Deserialize)]
struct DailyColumns {
    time: Vec<String>,
    #[serde(default)]
    temperature_2m_mean: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_sum: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m_max: Vec<Option<f64>>,
    #[serde(default)]
    relative_humidity_2m_mean: Vec<Option<f64>>,
    /// Seconds
    #[serde(default)]
    sunshine_duration: Vec<Option<f64>>,
    #[serde(default)]
    weather_code: Vec<Option<f64>>,
}

#[derive(Debug, Default, Deserialize)]
struct HourlyColumns {
    time: Vec<String>,
    #[serde(default)]
    temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    precipitation: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m: Vec<Option<f64>>,
    #[serde(default)]
    relative_humidity_2m: Vec<Option<f64>>,
    /// Seconds within the hour
    #[serde(default)]
    sunshine_duration: Vec<Option<f64>>,
    #[serde(default)]
    weather_code: Vec<Option<f64>>,
}

fn at(column: &[Option<f64>], i: usize) -> Option<f64> {
    column.get(i).copied().flatten().filter(|v| v.is_finite())
}

fn hours(column: &[Option<f64>], i: usize) -> Option<f64> {
    at(column, i).map(|secs| secs / SECONDS_PER_HOUR)
}

fn code(column: &[Option<f64>], i: usize) -> Option<i32> {
    at(column, i).map(|c| c.round() as i32)
}

impl DailyColumns {
    fn into_records(self) -> Vec<DailyRecord> {
        self.time
            .iter()
            .enumerate()
            .filter_map(|(i, day)| {
                let date = parse_date(day).ok()?;
                let metrics = Metrics {
                    temp_avg: at(&self.temperature_2m_mean, i),
                    temp_min: at(&self.temperature_2m_min, i),
                    temp_max: at(&self.temperature_2m_max, i),
                    precipitation: at(&self.precipitation_sum, i),
                    wind_speed: at(&self.wind_speed_10m_max, i),
                    humidity: at(&self.relative_humidity_2m_mean, i),
                    sunshine_hours: hours(&self.sunshine_duration, i),
                    weather_code: code(&self.weather_code, i),
                };
                Some(DailyRecord::new(date, metrics))
            })
            .collect()
    }
}

impl HourlyColumns {
    fn into_records(self) -> Vec<HourlyRecord> {
        self.time
            .iter()
            .enumerate()
            .filter_map(|(i, ts)| {
                let timestamp = parse_timestamp(ts)?;
                let temperature = at(&self.temperature_2m, i);
                let metrics = Metrics {
                    temp_avg: temperature,
                    temp_min: temperature,
                    temp_max: temperature,
                    precipitation: at(&self.precipitation, i),
                    wind_speed: at(&self.wind_speed_10m, i),
                    humidity: at(&self.relative_humidity_2m, i),
                    sunshine_hours: hours(&self.sunshine_duration, i),
                    weather_code: code(&self.weather_code, i),
                };
                HourlyRecord::at(timestamp, metrics)
            })
            .collect()
    }
}

/// Remote archive query client
#[derive(Debug, Clone)]
pub struct RemoteArchiveSource {
    client: Client,
    base_url: Url,
    timezone: String,
    timeout: Duration,
}

impl RemoteArchiveSource {
    pub fn new(base_url: &str, timezone: &str, timeout: Duration) -> FetchResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: Url::parse(base_url)?,
            timezone: timezone.to_string(),
            timeout,
        })
    }

    fn query_url(&self, location: &Location, range: &DateRange, resolution: &str, fields: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("latitude", &location.latitude.to_string())
            .append_pair("longitude", &location.longitude.to_string())
            .append_pair("start_date", &range.start().format(DATE_FORMAT).to_string())
            .append_pair("end_date", &range.end().format(DATE_FORMAT).to_string())
            .append_pair(resolution, &fields.join(","))
            .append_pair("timezone", &self.timezone);
        url
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> FetchResult<T> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(self.timeout)
            } else {
                FetchError::Http(e)
            }
        })?;
        let status = response.status();

        if !status.is_success() {
            let reason = response
                .json::<ArchiveErrorBody>()
                .await
                .ok()
                .and_then(|body| body.reason)
                .unwrap_or_else(|| status.to_string());
            return Err(FetchError::Status {
                status: status.as_u16(),
                reason,
            });
        }

        Ok(response.json::<T>().await?)
    }

    /// Daily archive records for a range
    #[instrument(skip_all, fields(%location, %range))]
    pub async fn daily(&self, location: &Location, range: &DateRange) -> FetchResult<Vec<DailyRecord>> {
        let url = self.query_url(location, range, "daily", DAILY_FIELDS);
        let response: ArchiveResponse = self.get(url).await?;
        let columns = response
            .daily
            .ok_or_else(|| FetchError::Malformed("missing daily block".to_string()))?;

        let records = columns.into_records();
        debug!("Remote archive returned {} daily records", records.len());
        Ok(records)
    }

    /// Hourly archive records for a range
    #[instrument(skip_all, fields(%location, %range))]
    pub async fn hourly(&self, location: &Location, range: &DateRange) -> FetchResult<Vec<HourlyRecord>> {
        let url = self.query_url(location, range, "hourly", HOURLY_FIELDS);
        let response: ArchiveResponse = self.get(url).await?;
        let columns = response
            .hourly
            .ok_or_else(|| FetchError::Malformed("missing hourly block".to_string()))?;

        let records = columns.into_records();
        debug!("Remote archive returned {} hourly records", records.len());
        Ok(records)
    }
}

#[async_trait::async_trait]
impl DataSource for RemoteArchiveSource {
    fn kind(&self) -> SourceKind {
        SourceKind::RemoteArchive
    }

    async fn fetch_daily(&self, location: &Location, range: &DateRange) -> Result<Vec<DailyRecord>> {
        Ok(self.daily(location, range).await?)
    }

    async fn fetch_hourly(
        &self,
        location: &Location,
        range: &DateRange,
    ) -> Result<Vec<HourlyRecord>> {
        Ok(self.hourly(location, range).await?)
    }
}
