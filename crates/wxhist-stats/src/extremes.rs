use serde::Serialize;
use wxhist_core::{Metric, Observation};

/// Records holding the extreme value of each headline metric
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Extremes<R> {
    /// Highest `tempMax`
    pub hottest: Option<R>,
    /// Lowest `tempMin`
    pub coldest: Option<R>,
    /// Highest `precipitation`
    pub wettest: Option<R>,
    /// Highest `windSpeed`
    pub windiest: Option<R>,
}

/// First record whose `metric` beats every earlier one under `better`
fn first_extreme<R: Observation>(records: &[R], metric: Metric, better: fn(f64, f64) -> bool) -> Option<&R> {
    let mut best: Option<(&R, f64)> = None;
    for record in records {
        let Some(value) = record.metrics().get(metric).filter(|v| v.is_finite()) else {
            continue;
        };
        if best.map_or(true, |(_, current)| better(value, current)) {
            best = Some((record, value));
        }
    }
    best.map(|(record, _)| record)
}

/// Extreme records of a dataset; ties resolve to the earliest in input order
pub fn find_extremes<R: Observation + Clone>(records: &[R]) -> Extremes<R> {
    let highest = |metric| first_extreme(records, metric, |a, b| a > b).cloned();
    let lowest = |metric| first_extreme(records, metric, |a, b| a < b).cloned();

    Extremes {
        hottest: highest(Metric::TempMax),
        coldest: lowest(Metric::TempMin),
        wettest: highest(Metric::Precipitation),
        windiest: highest(Metric::WindSpeed),
    }
}
