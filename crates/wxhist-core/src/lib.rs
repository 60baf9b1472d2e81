//! Core data types, granularity model, and running accumulators for
//! historical weather data.
//!
//! Every other wxhist crate builds on the record shapes defined here;
//! the aggregation and statistics crates share the same accumulator so
//! that chart buckets and summaries agree on null handling.

pub mod granularity;
pub mod rollups;
pub mod scheduler;
pub mod source;
pub mod types;

pub use granularity::*;
pub use rollups::*;
pub use scheduler::*;
pub use source::*;
pub use types::*;
