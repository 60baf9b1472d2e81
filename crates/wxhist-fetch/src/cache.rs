//! TTL cache for resolved datasets

use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use wxhist_core::{DailyRecord, DateRange, Granularity, HourlyRecord, Location, SourceKind};

/// Default time-to-live of a cache entry
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Resolution of the requested records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    Daily,
    Hourly,
}

impl DataKind {
    pub fn resolution(&self) -> Granularity {
        match self {
            DataKind::Daily => Granularity::Day,
            DataKind::Hourly => Granularity::Hour,
        }
    }
}

/// Records plus where they came from
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset<T> {
    pub records: Arc<Vec<T>>,
    pub source: SourceKind,
    /// Hourly samples replicated from daily values
    pub derived_from_daily: bool,
}

impl<T> Dataset<T> {
    pub fn new(records: Vec<T>, source: SourceKind) -> Self {
        Self {
            records: Arc::new(records),
            source,
            derived_from_daily: false,
        }
    }

    pub fn records(&self) -> &[T] {
        &self.records
    }

    pub fn is_synthetic(&self) -> bool {
        self.source.is_synthetic()
    }
}

impl<T> Deref for Dataset<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.records
    }
}

/// A cached dataset of either resolution
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Daily(Dataset<DailyRecord>),
    Hourly(Dataset<HourlyRecord>),
}

impl Payload {
    pub fn kind(&self) -> DataKind {
        match self {
            Payload::Daily(_) => DataKind::Daily,
            Payload::Hourly(_) => DataKind::Hourly,
        }
    }

    pub fn source(&self) -> SourceKind {
        match self {
            Payload::Daily(d) => d.source,
            Payload::Hourly(h) => h.source,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Payload::Daily(d) => d.len(),
            Payload::Hourly(h) => h.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cache identity: location (to 1e-4 degrees), date range and record kind
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    lat_e4: i64,
    lon_e4: i64,
    pub range: DateRange,
    pub kind: DataKind,
}

impl CacheKey {
    pub fn new(location: &Location, range: DateRange, kind: DataKind) -> Self {
        Self {
            lat_e4: (location.latitude * 1e4).round() as i64,
            lon_e4: (location.longitude * 1e4).round() as i64,
            range,
            kind,
        }
    }

    pub fn with_kind(&self, kind: DataKind) -> Self {
        Self {
            kind,
            ..self.clone()
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.4},{:.4}:{}:{}",
            self.lat_e4 as f64 / 1e4,
            self.lon_e4 as f64 / 1e4,
            self.range,
            self.kind.resolution()
        )
    }
}

/// A cached dataset and its absolute expiry
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub data: Payload,
    pub expires_at: Instant,
}

impl CacheEntry {
    pub fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

/// In-memory dataset cache with lazy TTL eviction
#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    entries: HashMap<CacheKey, CacheEntry>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a live entry, evicting it if it has expired
    pub fn get(&mut self, key: &CacheKey) -> Option<Payload> {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                debug!(%key, "Evicting expired cache entry");
                self.entries.remove(key);
                None
            }
            Some(entry) => Some(entry.data.clone()),
            None => None,
        }
    }

    /// Store a dataset, replacing any previous entry for the key
    pub fn insert(&mut self, key: CacheKey, data: Payload) {
        let entry = CacheEntry {
            key: key.clone(),
            data,
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.insert(key, entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of stored entries, expired ones included until looked up
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
