use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{DailyRecord, DateRange, HourlyRecord, Location};

/// Endpoint of the Open-Meteo historical archive
pub const DEFAULT_ARCHIVE_URL: &str = "https://archive-api.open-meteo.com/v1/archive";

/// Where a dataset came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceKind {
    PrimaryService,
    RemoteArchive,
    Synthetic,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::PrimaryService => "primary-service",
            SourceKind::RemoteArchive => "remote-archive",
            SourceKind::Synthetic => "synthetic",
        }
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self, SourceKind::Synthetic)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider of historical records, tried in priority order by the fetch pipeline.
///
/// An error or an empty result both mean "try the next source".
#[async_trait::async_trait]
pub trait DataSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    async fn fetch_daily(&self, location: &Location, range: &DateRange)
        -> Result<Vec<DailyRecord>>;

    /// Sources without hourly resolution answer with no data
    async fn fetch_hourly(
        &self,
        _location: &Location,
        _range: &DateRange,
    ) -> Result<Vec<HourlyRecord>> {
        Ok(Vec::new())
    }
}
