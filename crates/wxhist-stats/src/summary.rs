//! Scalar summary statistics and day-type counters

use crate::trends::{TrendAccumulator, Trends};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;
use wxhist_core::{Metric, MetricSet, Metrics, Observation, Scheduler};

pub const HOT_DAY_MAX: f64 = 30.0;
pub const SUMMER_DAY_MAX: f64 = 25.0;
pub const TROPICAL_NIGHT_MIN: f64 = 20.0;
pub const RAIN_DAY_PRECIP: f64 = 0.1;
pub const HEAVY_RAIN_PRECIP: f64 = 10.0;
pub const STORM_WIND: f64 = 62.0;
pub const SUNNY_DAY_HOURS: f64 = 8.0;

/// Number of calendar days matching each day-type threshold
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayCounts {
    /// tempMin < 0
    pub frost_days: usize,
    /// tempMax < 0
    pub ice_days: usize,
    pub hot_days: usize,
    pub summer_days: usize,
    pub tropical_nights: usize,
    pub rain_days: usize,
    pub heavy_rain_days: usize,
    pub storm_days: usize,
    pub sunny_days: usize,
}

impl DayCounts {
    /// Tally one day, given its metrics reduced over the whole day
    pub fn count(&mut self, m: &Metrics) {
        let tally = |counter: &mut usize, value: Option<f64>, hit: fn(f64) -> bool| {
            if value.is_some_and(hit) {
                *counter += 1;
            }
        };

        tally(&mut self.frost_days, m.temp_min, |v| v < 0.0);
        tally(&mut self.ice_days, m.temp_max, |v| v < 0.0);
        tally(&mut self.hot_days, m.temp_max, |v| v >= HOT_DAY_MAX);
        tally(&mut self.summer_days, m.temp_max, |v| v >= SUMMER_DAY_MAX);
        tally(&mut self.tropical_nights, m.temp_min, |v| v >= TROPICAL_NIGHT_MIN);
        tally(&mut self.rain_days, m.precipitation, |v| v >= RAIN_DAY_PRECIP);
        tally(&mut self.heavy_rain_days, m.precipitation, |v| v >= HEAVY_RAIN_PRECIP);
        tally(&mut self.storm_days, m.wind_speed, |v| v >= STORM_WIND);
        tally(&mut self.sunny_days, m.sunshine_hours, |v| v >= SUNNY_DAY_HOURS);
    }
}

/// Immutable statistics over one dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSummary {
    pub avg_temp: Option<f64>,
    pub max_temp: Option<f64>,
    pub min_temp: Option<f64>,
    pub temp_range: Option<f64>,
    pub total_precip: Option<f64>,
    pub max_precip: Option<f64>,
    pub avg_wind: Option<f64>,
    pub max_wind: Option<f64>,
    pub avg_humidity: Option<f64>,
    pub total_sunshine: Option<f64>,
    #[serde(flatten)]
    pub days: DayCounts,
    pub record_count: usize,
    pub valid_temp_count: usize,
    /// Share of records carrying a valid average temperature
    pub data_quality: f64,
    pub trends: Trends,
}

/// Single-pass accumulator behind both execution modes.
///
/// Scalars run over every record. Day counters run over one rollup per
/// calendar date, so sub-daily records count their day once.
#[derive(Debug, Clone, Default)]
pub struct SummaryAccumulator {
    metrics: MetricSet,
    days: BTreeMap<NaiveDate, MetricSet>,
    record_count: usize,
    latest: Option<NaiveDate>,
}

impl SummaryAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<R: Observation>(&mut self, record: &R) {
        let metrics = record.metrics();
        self.metrics.push(metrics);
        let date = record.date();
        self.days.entry(date).or_default().push(metrics);
        self.record_count += 1;

        if self.latest.map_or(true, |latest| date > latest) {
            self.latest = Some(date);
        }
    }

    /// Date of the most recent record seen so far
    pub fn latest(&self) -> Option<NaiveDate> {
        self.latest
    }

    pub fn finish(&self, trends: Trends) -> StatisticsSummary {
        let stat = |metric| self.metrics.get(metric);

        let max_temp = stat(Metric::TempMax).max();
        let min_temp = stat(Metric::TempMin).min();
        let valid_temp_count = stat(Metric::TempAvg).count();
        let data_quality = if self.record_count == 0 {
            0.0
        } else {
            valid_temp_count as f64 / self.record_count as f64
        };

        let mut days = DayCounts::default();
        for day in self.days.values() {
            days.count(&day.reduced());
        }

        StatisticsSummary {
            avg_temp: stat(Metric::TempAvg).mean(),
            max_temp,
            min_temp,
            temp_range: max_temp.zip(min_temp).map(|(max, min)| max - min),
            total_precip: stat(Metric::Precipitation).sum(),
            max_precip: stat(Metric::Precipitation).max(),
            avg_wind: stat(Metric::WindSpeed).mean(),
            max_wind: stat(Metric::WindSpeed).max(),
            avg_humidity: stat(Metric::Humidity).mean(),
            total_sunshine: stat(Metric::SunshineHours).sum(),
            days,
            record_count: self.record_count,
            valid_temp_count,
            data_quality,
            trends,
        }
    }
}

/// Summary in one synchronous pass
pub fn calculate_stats<R: Observation>(records: &[R]) -> StatisticsSummary {
    let mut acc = SummaryAccumulator::new();
    for record in records {
        acc.push(record);
    }

    let mut trends = TrendAccumulator::new(acc.latest());
    for record in records {
        trends.push(record);
    }
    acc.finish(trends.finish())
}

fn percent(done: usize, total: usize) -> u8 {
    (done * 100 / total).min(100) as u8
}

/// Summary computed in chunks of `chunk_size` records, yielding to
/// `scheduler` between chunks.
///
/// `on_progress` receives the percentage of chunks processed across both
/// passes (scalars, then trend windows). The result equals
/// [`calculate_stats`] for the same input.
pub async fn calculate_stats_async<R, S, F>(
    records: &[R],
    scheduler: &S,
    chunk_size: usize,
    mut on_progress: F,
) -> StatisticsSummary
where
    R: Observation,
    S: Scheduler + ?Sized,
    F: FnMut(u8),
{
    let chunk_size = chunk_size.max(1);
    let total = 2 * records.len().div_ceil(chunk_size);
    let mut done = 0;

    let mut acc = SummaryAccumulator::new();
    for chunk in records.chunks(chunk_size) {
        for record in chunk {
            acc.push(record);
        }
        done += 1;
        on_progress(percent(done, total));
        scheduler.yield_now().await;
    }

    let mut trends = TrendAccumulator::new(acc.latest());
    for chunk in records.chunks(chunk_size) {
        for record in chunk {
            trends.push(record);
        }
        done += 1;
        on_progress(percent(done, total));
        if done < total {
            scheduler.yield_now().await;
        }
    }

    if total == 0 {
        on_progress(100);
    }
    debug!(records = records.len(), chunks = total, "Chunked statistics complete");
    acc.finish(trends.finish())
}
