//! Automatic granularity selection for charting

use crate::aggregator::{aggregate, ChartSeries};
use tracing::debug;
use wxhist_core::{Granularity, Observation};

/// Pick the coarsest granularity that keeps a series of `total_raw_points`
/// daily samples renderable (roughly 10 to 120 points).
pub fn select_granularity(total_raw_points: usize) -> Granularity {
    match total_raw_points {
        n if n > 10_000 => Granularity::Decade,
        n if n > 2_000 => Granularity::Year,
        n if n >= 730 => Granularity::Month,
        n if n >= 180 => Granularity::Week,
        _ => Granularity::Day,
    }
}

/// How the caller wants the chart granularity decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GranularityChoice {
    #[default]
    Auto,
    Fixed(Granularity),
}

impl GranularityChoice {
    pub fn resolve(self, total_raw_points: usize) -> Granularity {
        match self {
            GranularityChoice::Auto => select_granularity(total_raw_points),
            GranularityChoice::Fixed(granularity) => granularity,
        }
    }
}

impl From<Option<Granularity>> for GranularityChoice {
    fn from(value: Option<Granularity>) -> Self {
        value.map_or(GranularityChoice::Auto, GranularityChoice::Fixed)
    }
}

/// Aggregate `records` for display. An explicit granularity bypasses the selector.
pub fn chart_series<T: Observation>(
    records: &[T],
    choice: GranularityChoice,
) -> (Granularity, ChartSeries<'_, T>) {
    let granularity = choice.resolve(records.len());
    debug!(
        points = records.len(),
        ?choice,
        %granularity,
        "Selected chart granularity"
    );
    (granularity, aggregate(records, granularity))
}
