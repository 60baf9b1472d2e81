//! Fetch/cache pipeline for historical weather records
//!
//! Resolves a (location, date range, kind) request through a prioritized
//! list of data sources: an injected primary weather service, a direct
//! query against the remote archive, and finally a deterministic synthetic
//! generator. Results are memoized with a TTL and identical concurrent
//! requests share a single fetch.

pub mod archive;
pub mod cache;
pub mod pipeline;
pub mod primary;
pub mod synthetic;

pub use archive::*;
pub use cache::*;
pub use pipeline::*;
pub use primary::*;
pub use synthetic::*;

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote archive returned status {status}: {reason}")]
    Status { status: u16, reason: String },

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

pub type FetchResult<T> = Result<T, FetchError>;
