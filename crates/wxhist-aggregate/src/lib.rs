//! Granularity aggregation for chart display
//!
//! Re-buckets raw daily or hourly samples into coarser time units and
//! picks a granularity that keeps the rendered point count bounded.

pub mod aggregator;
pub mod selector;

pub use aggregator::*;
pub use selector::*;
