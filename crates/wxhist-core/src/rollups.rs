//! Running accumulators shared by bucket aggregation and summary statistics

use crate::types::{Metric, Metrics};
use serde::{Deserialize, Serialize};

/// Reduction applied to a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateType {
    Min,
    Max,
    Sum,
    Avg,
    Count,
}

/// Running count/sum/min/max over the non-null values of one metric.
///
/// Values are never buffered, so memory stays constant however many
/// samples are added.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunningStat {
    count: usize,
    sum: f64,
    min: f64,
    max: f64,
}

impl Default for RunningStat {
    fn default() -> Self {
        Self::new()
    }
}

impl RunningStat {
    pub fn new() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    /// Add a sample. Non-finite values are treated as missing.
    pub fn add(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn add_opt(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.add(v);
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn sum(&self) -> Option<f64> {
        (!self.is_empty()).then_some(self.sum)
    }

    pub fn mean(&self) -> Option<f64> {
        (!self.is_empty()).then(|| self.sum / self.count as f64)
    }

    pub fn min(&self) -> Option<f64> {
        (!self.is_empty()).then_some(self.min)
    }

    pub fn max(&self) -> Option<f64> {
        (!self.is_empty()).then_some(self.max)
    }

    /// Reduce to a single value; `None` when no sample was ever added
    pub fn result(&self, aggregate_type: AggregateType) -> Option<f64> {
        match aggregate_type {
            AggregateType::Min => self.min(),
            AggregateType::Max => self.max(),
            AggregateType::Sum => self.sum(),
            AggregateType::Avg => self.mean(),
            AggregateType::Count => Some(self.count as f64),
        }
    }
}

/// Default bucket reduction for each metric
pub fn default_aggregate_type(metric: Metric) -> AggregateType {
    match metric {
        Metric::TempAvg => AggregateType::Avg,
        Metric::TempMin => AggregateType::Min,
        Metric::TempMax => AggregateType::Max,
        Metric::Precipitation | Metric::SunshineHours => AggregateType::Sum,
        Metric::WindSpeed | Metric::Humidity => AggregateType::Avg,
    }
}

/// One [`RunningStat`] per metric
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricSet {
    stats: [RunningStat; 7],
}

impl MetricSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, metrics: &Metrics) {
        for metric in Metric::ALL {
            self.stats[metric.index()].add_opt(metrics.get(metric));
        }
    }

    pub fn get(&self, metric: Metric) -> &RunningStat {
        &self.stats[metric.index()]
    }

    /// Reduce a metric with its default aggregate type
    pub fn reduce(&self, metric: Metric) -> Option<f64> {
        self.get(metric).result(default_aggregate_type(metric))
    }

    /// Every metric reduced with its default aggregate type. The weather
    /// code is not tracked here and stays `None`.
    pub fn reduced(&self) -> Metrics {
        Metrics {
            temp_avg: self.reduce(Metric::TempAvg),
            temp_min: self.reduce(Metric::TempMin),
            temp_max: self.reduce(Metric::TempMax),
            precipitation: self.reduce(Metric::Precipitation),
            wind_speed: self.reduce(Metric::WindSpeed),
            humidity: self.reduce(Metric::Humidity),
            sunshine_hours: self.reduce(Metric::SunshineHours),
            weather_code: None,
        }
    }
}
