//! Bucket aggregation of raw records

use chrono::{NaiveDateTime, Timelike};
use std::collections::BTreeMap;
use tracing::{debug, instrument};
use wxhist_core::{AggregatedBucket, Granularity, LabelStyle, Metric, MetricSet, Observation};

/// Result of aggregating a series at some granularity
#[derive(Debug, Clone, PartialEq)]
pub enum ChartSeries<'a, T> {
    /// `day` granularity: the input records, untouched
    Raw(&'a [T]),
    /// One summary per bucket, ascending by representative date
    Buckets(Vec<AggregatedBucket>),
}

impl<'a, T: Observation> ChartSeries<'a, T> {
    pub fn len(&self) -> usize {
        match self {
            ChartSeries::Raw(records) => records.len(),
            ChartSeries::Buckets(buckets) => buckets.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Display label of every point, in series order
    pub fn labels(&self, granularity: Granularity, style: LabelStyle) -> Vec<String> {
        match self {
            ChartSeries::Raw(records) => records
                .iter()
                .map(|r| granularity.label(r.timestamp(), style))
                .collect(),
            ChartSeries::Buckets(buckets) => buckets
                .iter()
                .map(|b| granularity.label(b.start(), style))
                .collect(),
        }
    }

    /// Uniform bucket view; raw records become per-day buckets
    pub fn into_buckets(self) -> Vec<AggregatedBucket> {
        match self {
            ChartSeries::Raw(records) => bucketize(records, Granularity::Day),
            ChartSeries::Buckets(buckets) => buckets,
        }
    }
}

/// Aggregate `records` at `granularity`.
///
/// `day` is a passthrough that hands back the input slice itself.
pub fn aggregate<T: Observation>(records: &[T], granularity: Granularity) -> ChartSeries<'_, T> {
    if granularity == Granularity::Day {
        return ChartSeries::Raw(records);
    }
    ChartSeries::Buckets(bucketize(records, granularity))
}

/// Group records by bucket key and reduce every group
#[instrument(skip(records), fields(records = records.len()))]
pub fn bucketize<T: Observation>(records: &[T], granularity: Granularity) -> Vec<AggregatedBucket> {
    let mut groups: BTreeMap<String, BucketBuilder> = BTreeMap::new();

    for record in records {
        let ts = record.timestamp();
        groups
            .entry(granularity.key(ts))
            .or_insert_with(|| BucketBuilder::new(ts))
            .push(record);
    }

    let mut buckets: Vec<AggregatedBucket> = groups
        .into_iter()
        .map(|(key, builder)| builder.finish(key, granularity))
        .collect();

    // Representative dates come from the first member in input order, so
    // the key order is not enough when the input was unsorted.
    buckets.sort_by(|a, b| (a.date, a.hour).cmp(&(b.date, b.hour)));

    debug!(
        "Aggregated {} records into {} {} buckets",
        records.len(),
        buckets.len(),
        granularity
    );
    buckets
}

struct BucketBuilder {
    first: NaiveDateTime,
    metrics: MetricSet,
    weather_code: Option<i32>,
    count: usize,
}

impl BucketBuilder {
    fn new(first: NaiveDateTime) -> Self {
        Self {
            first,
            metrics: MetricSet::new(),
            weather_code: None,
            count: 0,
        }
    }

    fn push<T: Observation>(&mut self, record: &T) {
        let metrics = record.metrics();
        self.metrics.push(metrics);
        self.weather_code = match (self.weather_code, metrics.weather_code) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        self.count += 1;
    }

    fn finish(self, key: String, granularity: Granularity) -> AggregatedBucket {
        AggregatedBucket {
            key,
            date: self.first.date(),
            hour: (granularity == Granularity::Hour).then(|| self.first.hour()),
            temp_avg: self.metrics.reduce(Metric::TempAvg),
            temp_min: self.metrics.reduce(Metric::TempMin),
            temp_max: self.metrics.reduce(Metric::TempMax),
            precipitation: self.metrics.reduce(Metric::Precipitation),
            sunshine_hours: self.metrics.reduce(Metric::SunshineHours),
            wind_speed: self.metrics.reduce(Metric::WindSpeed),
            humidity: self.metrics.reduce(Metric::Humidity),
            weather_code: self.weather_code,
            sample_count: self.count,
        }
    }
}
