//! Descriptive statistics over historical weather records
//!
//! A summary can be computed in one synchronous pass or cooperatively in
//! fixed-size chunks with a yield between chunks. Both modes feed the same
//! accumulators in the same order and therefore agree bit for bit.

pub mod extremes;
pub mod scheduler;
pub mod summary;
pub mod trends;

pub use extremes::*;
pub use scheduler::*;
pub use summary::*;
pub use trends::*;

pub use wxhist_core::DEFAULT_CHUNK_SIZE;
