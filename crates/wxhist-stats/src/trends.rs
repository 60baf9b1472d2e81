//! Week-over-week trend deltas

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use wxhist_core::{Metric, MetricSet, Observation};

/// Deltas within +/- this band are reported as stable
pub const TREND_DEAD_ZONE: f64 = 0.5;

/// Length of each comparison window
pub const TREND_WINDOW_DAYS: u64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}

impl TrendDirection {
    pub fn from_delta(delta: f64) -> Self {
        if delta > TREND_DEAD_ZONE {
            TrendDirection::Up
        } else if delta < -TREND_DEAD_ZONE {
            TrendDirection::Down
        } else {
            TrendDirection::Stable
        }
    }
}

/// Change of one metric between the previous and the current week
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trend {
    pub percent_change: Option<f64>,
    pub direction: TrendDirection,
    pub raw_delta: Option<f64>,
}

impl Trend {
    pub const UNKNOWN: Trend = Trend {
        percent_change: None,
        direction: TrendDirection::Stable,
        raw_delta: None,
    };

    pub fn between(current: Option<f64>, previous: Option<f64>) -> Self {
        let (Some(current), Some(previous)) = (current, previous) else {
            return Self::UNKNOWN;
        };
        let raw_delta = current - previous;
        let percent_change = (previous != 0.0).then(|| raw_delta / previous.abs() * 100.0);

        Self {
            percent_change,
            direction: TrendDirection::from_delta(raw_delta),
            raw_delta: Some(raw_delta),
        }
    }
}

pub type Trends = BTreeMap<Metric, Trend>;

/// Every metric mapped to [`Trend::UNKNOWN`]
pub fn unknown_trends() -> Trends {
    Metric::ALL.iter().map(|&m| (m, Trend::UNKNOWN)).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Window {
    Current,
    Previous,
}

/// The two comparison windows ending at the latest record's date:
/// current = [latest-6, latest], previous = [latest-13, latest-7]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendWindows {
    latest: NaiveDate,
    current_start: NaiveDate,
    previous_start: NaiveDate,
}

impl TrendWindows {
    pub fn ending_at(latest: NaiveDate) -> Self {
        let back = |days: u64| latest.checked_sub_days(Days::new(days)).unwrap_or(NaiveDate::MIN);
        Self {
            latest,
            current_start: back(TREND_WINDOW_DAYS - 1),
            previous_start: back(2 * TREND_WINDOW_DAYS - 1),
        }
    }

    fn classify(&self, date: NaiveDate) -> Option<Window> {
        if date > self.latest || date < self.previous_start {
            None
        } else if date >= self.current_start {
            Some(Window::Current)
        } else {
            Some(Window::Previous)
        }
    }
}

/// Accumulates both windows in a single pass once the latest date is known
#[derive(Debug, Clone)]
pub struct TrendAccumulator {
    windows: Option<TrendWindows>,
    current: MetricSet,
    previous: MetricSet,
    current_records: usize,
    previous_records: usize,
}

impl TrendAccumulator {
    pub fn new(latest: Option<NaiveDate>) -> Self {
        Self {
            windows: latest.map(TrendWindows::ending_at),
            current: MetricSet::new(),
            previous: MetricSet::new(),
            current_records: 0,
            previous_records: 0,
        }
    }

    pub fn push<R: Observation>(&mut self, record: &R) {
        let Some(windows) = self.windows else {
            return;
        };
        match windows.classify(record.date()) {
            Some(Window::Current) => {
                self.current.push(record.metrics());
                self.current_records += 1;
            }
            Some(Window::Previous) => {
                self.previous.push(record.metrics());
                self.previous_records += 1;
            }
            None => {}
        }
    }

    pub fn finish(&self) -> Trends {
        if self.current_records == 0 || self.previous_records == 0 {
            return unknown_trends();
        }
        Metric::ALL
            .iter()
            .map(|&metric| {
                let trend = Trend::between(self.current.reduce(metric), self.previous.reduce(metric));
                (metric, trend)
            })
            .collect()
    }
}

/// Trends of a record set, windows anchored at its latest date
pub fn compute_trends<R: Observation>(records: &[R]) -> Trends {
    let latest = records.iter().map(|r| r.date()).max();
    let mut acc = TrendAccumulator::new(latest);
    for record in records {
        acc.push(record);
    }
    acc.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wxhist_core::{DailyRecord, Metrics};

    fn day(date: &str, temp: f64) -> DailyRecord {
        DailyRecord::new(
            wxhist_core::parse_date(date).unwrap(),
            Metrics {
                temp_avg: Some(temp),
                ..Metrics::default()
            },
        )
    }

    fn two_weeks(previous: f64, current: f64) -> Vec<DailyRecord> {
        (1..=14)
            .map(|d| {
                let temp = if d <= 7 { previous } else { current };
                day(&format!("2024-03-{d:02}"), temp)
            })
            .collect()
    }

    #[test]
    fn test_dead_zone_boundary_is_stable() {
        let trends = compute_trends(&two_weeks(10.0, 10.5));
        let temp = trends[&Metric::TempAvg];

        assert_eq!(temp.raw_delta, Some(0.5));
        assert_eq!(temp.direction, TrendDirection::Stable);
        assert_eq!(temp.percent_change, Some(5.0));
    }

    #[test]
    fn test_direction_outside_dead_zone() {
        assert_eq!(compute_trends(&two_weeks(10.0, 11.0))[&Metric::TempAvg].direction, TrendDirection::Up);
        assert_eq!(compute_trends(&two_weeks(10.0, 9.0))[&Metric::TempAvg].direction, TrendDirection::Down);
        assert_eq!(TrendDirection::from_delta(-0.5), TrendDirection::Stable);
    }

    #[test]
    fn test_windows_anchor_on_latest_date() {
        let windows = TrendWindows::ending_at(wxhist_core::parse_date("2024-03-14").unwrap());
        let at = |s: &str| windows.classify(wxhist_core::parse_date(s).unwrap());

        assert_eq!(at("2024-03-14"), Some(Window::Current));
        assert_eq!(at("2024-03-08"), Some(Window::Current));
        assert_eq!(at("2024-03-07"), Some(Window::Previous));
        assert_eq!(at("2024-03-01"), Some(Window::Previous));
        assert_eq!(at("2024-02-29"), None);
    }

    #[test]
    fn test_empty_window_yields_unknown_for_every_metric() {
        // Only the current week present
        let records: Vec<_> = (8..=14).map(|d| day(&format!("2024-03-{d:02}"), 5.0)).collect();
        let trends = compute_trends(&records);

        assert_eq!(trends.len(), Metric::ALL.len());
        assert!(trends.values().all(|t| *t == Trend::UNKNOWN));
        assert_eq!(compute_trends::<DailyRecord>(&[]), unknown_trends());
    }

    #[test]
    fn test_percent_change_undefined_for_zero_baseline() {
        let trend = Trend::between(Some(3.0), Some(0.0));
        assert_eq!(trend.raw_delta, Some(3.0));
        assert_eq!(trend.percent_change, None);
        assert_eq!(trend.direction, TrendDirection::Up);

        let negative = Trend::between(Some(-1.0), Some(-2.0));
        assert_eq!(negative.percent_change, Some(50.0));
    }

    #[test]
    fn test_null_metric_has_no_trend() {
        let trends = compute_trends(&two_weeks(10.0, 12.0));
        assert_eq!(trends[&Metric::Humidity], Trend::UNKNOWN);
    }
}
