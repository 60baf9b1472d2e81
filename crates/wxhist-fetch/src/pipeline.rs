//! Cached, deduplicated resolution of dataset requests

use crate::archive::RemoteArchiveSource;
use crate::cache::{CacheKey, DataKind, Dataset, Payload, ResponseCache, DEFAULT_TTL};
use crate::primary::{PrimarySource, WeatherService};
use crate::synthetic::SyntheticSource;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};
use wxhist_core::{
    DailyRecord, DataSource, DateRange, HourlyRecord, Location, SourceKind,
};

/// Default upper bound on a single source attempt
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(15);

type PendingLoad = Shared<BoxFuture<'static, Payload>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub ttl: Duration,
    pub source_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            source_timeout: DEFAULT_SOURCE_TIMEOUT,
        }
    }
}

struct PipelineState {
    cache: ResponseCache,
    in_flight: HashMap<CacheKey, PendingLoad>,
    /// Bumped by `clear_cache`; loads started under an older generation
    /// are not written back
    generation: u64,
}

struct Inner {
    sources: Vec<Arc<dyn DataSource>>,
    config: PipelineConfig,
    state: Mutex<PipelineState>,
}

/// Resolves dataset requests through cache, in-flight requests and the
/// source chain. Cheap to clone; clones share one cache.
#[derive(Clone)]
pub struct CachePipeline {
    inner: Arc<Inner>,
}

/// Builder for [`CachePipeline`]
#[derive(Default)]
pub struct PipelineBuilder {
    sources: Vec<Arc<dyn DataSource>>,
    config: PipelineConfig,
}

fn priority(kind: SourceKind) -> u8 {
    match kind {
        SourceKind::PrimaryService => 0,
        SourceKind::RemoteArchive => 1,
        SourceKind::Synthetic => 2,
    }
}

impl PipelineBuilder {
    pub fn primary(self, service: Arc<dyn WeatherService>) -> Self {
        self.source(Arc::new(PrimarySource::new(service)))
    }

    pub fn remote_archive(self, archive: RemoteArchiveSource) -> Self {
        self.source(Arc::new(archive))
    }

    pub fn source(mut self, source: Arc<dyn DataSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.config.ttl = ttl;
        self
    }

    pub fn source_timeout(mut self, source_timeout: Duration) -> Self {
        self.config.source_timeout = source_timeout;
        self
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sources are ordered primary, remote archive, synthetic. A synthetic
    /// source is appended when none was registered, so every load resolves.
    pub fn build(mut self) -> CachePipeline {
        if !self.sources.iter().any(|s| s.kind().is_synthetic()) {
            self.sources.push(Arc::new(SyntheticSource::new()));
        }
        self.sources.sort_by_key(|s| priority(s.kind()));

        info!(
            sources = ?self.sources.iter().map(|s| s.kind()).collect::<Vec<_>>(),
            ttl_secs = self.config.ttl.as_secs(),
            "Fetch pipeline ready"
        );

        CachePipeline {
            inner: Arc::new(Inner {
                sources: self.sources,
                config: self.config,
                state: Mutex::new(PipelineState {
                    cache: ResponseCache::new(self.config.ttl),
                    in_flight: HashMap::new(),
                    generation: 0,
                }),
            }),
        }
    }
}

impl CachePipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Resolve a request. Never fails: at worst the dataset is synthetic.
    #[instrument(skip_all, fields(%location, %range, ?kind))]
    pub async fn load(&self, location: Location, range: DateRange, kind: DataKind) -> Payload {
        let key = CacheKey::new(&location, range, kind);
        self.inner.load(key, location).await
    }

    pub async fn load_daily(&self, location: Location, range: DateRange) -> Dataset<DailyRecord> {
        match self.load(location, range, DataKind::Daily).await {
            Payload::Daily(dataset) => dataset,
            Payload::Hourly(_) => mismatched_payload(DataKind::Daily),
        }
    }

    pub async fn load_hourly(&self, location: Location, range: DateRange) -> Dataset<HourlyRecord> {
        match self.load(location, range, DataKind::Hourly).await {
            Payload::Hourly(dataset) => dataset,
            Payload::Daily(_) => mismatched_payload(DataKind::Hourly),
        }
    }

    /// Drop every cached entry and abandon in-flight requests
    pub async fn clear_cache(&self) {
        let mut state = self.inner.state.lock().await;
        let dropped = state.cache.len();
        state.cache.clear();
        state.in_flight.clear();
        state.generation += 1;
        info!(dropped, "Cache cleared");
    }

    /// Number of stored cache entries
    pub async fn cached_entries(&self) -> usize {
        self.inner.state.lock().await.cache.len()
    }

    /// Source kinds in resolution order
    pub fn sources(&self) -> Vec<SourceKind> {
        self.inner.sources.iter().map(|s| s.kind()).collect()
    }

    pub fn config(&self) -> PipelineConfig {
        self.inner.config
    }
}

fn mismatched_payload<T>(expected: DataKind) -> Dataset<T> {
    error!(?expected, "Cache returned a payload of the wrong kind");
    Dataset::new(Vec::new(), SourceKind::Synthetic)
}

fn empty_payload(kind: DataKind) -> Payload {
    match kind {
        DataKind::Daily => Payload::Daily(Dataset::new(Vec::new(), SourceKind::Synthetic)),
        DataKind::Hourly => Payload::Hourly(Dataset::new(Vec::new(), SourceKind::Synthetic)),
    }
}

impl Inner {
    /// Boxed rather than `async fn`: the hourly fallback re-enters `load`
    /// for the daily range from inside a pending load.
    fn load(self: &Arc<Self>, key: CacheKey, location: Location) -> BoxFuture<'static, Payload> {
        let inner = Arc::clone(self);
        async move {
            let pending = {
                let mut state = inner.state.lock().await;

                if let Some(hit) = state.cache.get(&key) {
                    debug!(%key, "Cache hit");
                    return hit;
                }

                match state.in_flight.get(&key) {
                    Some(pending) => {
                        debug!(%key, "Joining in-flight request");
                        pending.clone()
                    }
                    None => {
                        // Resolution runs on its own task so that it settles
                        // the in-flight entry even when every waiter is dropped.
                        let generation = state.generation;
                        let task = tokio::spawn(Arc::clone(&inner).resolve_and_store(
                            key.clone(),
                            location,
                            generation,
                        ));
                        let kind = key.kind;
                        let pending = async move {
                            task.await.unwrap_or_else(|e| {
                                error!(error = %e, "Dataset resolution task failed");
                                empty_payload(kind)
                            })
                        }
                        .boxed()
                        .shared();
                        state.in_flight.insert(key.clone(), pending.clone());
                        pending
                    }
                }
            };
            pending.await
        }
        .boxed()
    }

    async fn resolve_and_store(self: Arc<Self>, key: CacheKey, location: Location, generation: u64) -> Payload {
        let payload = match key.kind {
            DataKind::Daily => Payload::Daily(self.resolve_daily(&location, &key.range).await),
            DataKind::Hourly => Payload::Hourly(self.resolve_hourly(&location, &key).await),
        };

        let mut state = self.state.lock().await;
        if state.generation == generation {
            state.in_flight.remove(&key);
            state.cache.insert(key, payload.clone());
        } else {
            debug!(%key, "Cache cleared while loading; result not stored");
        }
        payload
    }

    async fn resolve_daily(&self, location: &Location, range: &DateRange) -> Dataset<DailyRecord> {
        for source in &self.sources {
            let fetch = source.fetch_daily(location, range);
            if let Some(records) = self.attempt(source.kind(), DataKind::Daily, range, fetch).await {
                info!(source = %source.kind(), records = records.len(), %range, "Loaded daily data");
                return Dataset::new(records, source.kind());
            }
        }

        error!(%location, %range, "Every data source failed");
        Dataset::new(Vec::new(), SourceKind::Synthetic)
    }

    async fn resolve_hourly(self: &Arc<Self>, location: &Location, key: &CacheKey) -> Dataset<HourlyRecord> {
        let range = &key.range;
        for source in &self.sources {
            let fetch = source.fetch_hourly(location, range);
            if let Some(records) = self.attempt(source.kind(), DataKind::Hourly, range, fetch).await {
                info!(source = %source.kind(), records = records.len(), %range, "Loaded hourly data");
                return Dataset::new(records, source.kind());
            }
        }

        info!(%range, "No hourly data available; deriving noon samples from daily data");
        let daily = match self.load(key.with_kind(DataKind::Daily), *location).await {
            Payload::Daily(daily) => daily,
            Payload::Hourly(_) => mismatched_payload(DataKind::Daily),
        };

        Dataset {
            records: Arc::new(daily.iter().map(HourlyRecord::from_daily).collect()),
            source: daily.source,
            derived_from_daily: true,
        }
    }

    /// One bounded attempt against a source; `Some` only for non-empty data
    async fn attempt<T>(
        &self,
        source: SourceKind,
        kind: DataKind,
        range: &DateRange,
        fetch: BoxFuture<'_, anyhow::Result<Vec<T>>>,
    ) -> Option<Vec<T>> {
        match timeout(self.config.source_timeout, fetch).await {
            Ok(Ok(records)) if !records.is_empty() => Some(records),
            Ok(Ok(_)) => {
                warn!(%source, ?kind, %range, "Source returned no data, trying next source");
                None
            }
            Ok(Err(e)) => {
                warn!(%source, ?kind, %range, error = %e, "Fetch failed, trying next source");
                None
            }
            Err(_) => {
                warn!(
                    %source,
                    ?kind,
                    %range,
                    timeout_secs = self.config.source_timeout.as_secs(),
                    "Fetch timed out, trying next source"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wxhist_core::Metrics;

    #[derive(Clone, Copy)]
    enum Behavior {
        Records,
        Empty,
        Fail,
        Hang,
        Slow(Duration),
    }

    struct CountingSource {
        kind: SourceKind,
        behavior: Behavior,
        hourly: bool,
        calls: Arc<AtomicUsize>,
    }

    impl CountingSource {
        fn new(kind: SourceKind, behavior: Behavior) -> (Arc<Self>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let source = Arc::new(Self {
                kind,
                behavior,
                hourly: false,
                calls: Arc::clone(&calls),
            });
            (source, calls)
        }

        async fn respond<T>(&self, make: impl FnOnce() -> Vec<T>) -> anyhow::Result<Vec<T>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Records => Ok(make()),
                Behavior::Empty => Ok(Vec::new()),
                Behavior::Fail => bail!("connection reset"),
                Behavior::Hang => std::future::pending().await,
                Behavior::Slow(delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(make())
                }
            }
        }
    }

    fn metrics(temp: f64) -> Metrics {
        Metrics {
            temp_avg: Some(temp),
            ..Metrics::default()
        }
    }

    #[async_trait::async_trait]
    impl DataSource for CountingSource {
        fn kind(&self) -> SourceKind {
            self.kind
        }

        async fn fetch_daily(
            &self,
            _location: &Location,
            range: &DateRange,
        ) -> anyhow::Result<Vec<DailyRecord>> {
            self.respond(|| {
                range
                    .iter_days()
                    .map(|d| DailyRecord::new(d, metrics(10.0)))
                    .collect()
            })
            .await
        }

        async fn fetch_hourly(
            &self,
            _location: &Location,
            range: &DateRange,
        ) -> anyhow::Result<Vec<HourlyRecord>> {
            if !self.hourly {
                return Ok(Vec::new());
            }
            self.respond(|| {
                range
                    .iter_days()
                    .flat_map(|d| (0..24).filter_map(move |h| HourlyRecord::new(d, h, metrics(5.0))))
                    .collect()
            })
            .await
        }
    }

    fn location() -> Location {
        Location::new(52.52, 13.41)
    }

    fn january() -> DateRange {
        DateRange::parse("2024-01-01", "2024-01-31").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_cache() {
        let (source, calls) = CountingSource::new(SourceKind::PrimaryService, Behavior::Records);
        let pipeline = CachePipeline::builder().source(source).build();

        let first = pipeline.load_daily(location(), january()).await;
        let second = pipeline.load_daily(location(), january()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
        assert_eq!(first.source, SourceKind::PrimaryService);
        assert_eq!(first.len(), 31);

        tokio::time::advance(Duration::from_secs(29 * 60)).await;
        pipeline.load_daily(location(), january()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(2 * 60)).await;
        pipeline.load_daily(location(), january()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_requests_share_one_fetch() {
        let (source, calls) = CountingSource::new(
            SourceKind::RemoteArchive,
            Behavior::Slow(Duration::from_millis(50)),
        );
        let pipeline = CachePipeline::builder().source(source).build();

        let (a, b) = tokio::join!(
            pipeline.load_daily(location(), january()),
            pipeline.load_daily(location(), january())
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a, b);
        assert!(Arc::ptr_eq(&a.records, &b.records));
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_keys_fetch_separately() {
        let (source, calls) = CountingSource::new(SourceKind::PrimaryService, Behavior::Records);
        let pipeline = CachePipeline::builder().source(source).build();

        pipeline.load_daily(location(), january()).await;
        pipeline
            .load_daily(Location::new(48.85, 2.35), january())
            .await;
        pipeline
            .load_daily(location(), DateRange::parse("2024-02-01", "2024-02-29").unwrap())
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(pipeline.cached_entries().await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_falls_through_to_synthetic() {
        let (primary, primary_calls) = CountingSource::new(SourceKind::PrimaryService, Behavior::Fail);
        let (archive, archive_calls) = CountingSource::new(SourceKind::RemoteArchive, Behavior::Empty);
        let pipeline = CachePipeline::builder()
            .source(archive)
            .source(primary)
            .build();

        assert_eq!(
            pipeline.sources(),
            vec![
                SourceKind::PrimaryService,
                SourceKind::RemoteArchive,
                SourceKind::Synthetic
            ]
        );

        let dataset = pipeline.load_daily(location(), january()).await;
        assert_eq!(dataset.source, SourceKind::Synthetic);
        assert!(dataset.is_synthetic());
        assert_eq!(dataset.len(), 31);
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(archive_calls.load(Ordering::SeqCst), 1);

        // Synthetic results are cached like real ones
        pipeline.load_daily(location(), january()).await;
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_source_times_out() {
        let (primary, _) = CountingSource::new(SourceKind::PrimaryService, Behavior::Hang);
        let (archive, archive_calls) = CountingSource::new(SourceKind::RemoteArchive, Behavior::Records);
        let pipeline = CachePipeline::builder()
            .source(primary)
            .source(archive)
            .source_timeout(Duration::from_secs(5))
            .build();

        let dataset = pipeline.load_daily(location(), january()).await;
        assert_eq!(dataset.source, SourceKind::RemoteArchive);
        assert_eq!(archive_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_synthetic_source_is_only_called_once_per_ttl() {
        let (synthetic, calls) = CountingSource::new(SourceKind::Synthetic, Behavior::Records);
        let pipeline = CachePipeline::builder().source(synthetic).build();
        assert_eq!(pipeline.sources(), vec![SourceKind::Synthetic]);

        pipeline.load_daily(location(), january()).await;
        pipeline.load_daily(location(), january()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hourly_degrades_to_noon_samples() {
        let (primary, calls) = CountingSource::new(SourceKind::PrimaryService, Behavior::Records);
        let pipeline = CachePipeline::builder().source(primary).build();

        let hourly = pipeline.load_hourly(location(), january()).await;
        assert!(hourly.derived_from_daily);
        assert_eq!(hourly.source, SourceKind::PrimaryService);
        assert_eq!(hourly.len(), 31);
        assert!(hourly.iter().all(|r| r.is_synthetic_from_daily && r.hour == 12));

        // The daily range was loaded through the cache as well
        assert_eq!(pipeline.cached_entries().await, 2);
        pipeline.load_daily(location(), january()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_real_hourly_data_preferred() {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = Arc::new(CountingSource {
            kind: SourceKind::RemoteArchive,
            behavior: Behavior::Records,
            hourly: true,
            calls: Arc::clone(&calls),
        });
        let pipeline = CachePipeline::builder().source(source).build();

        let range = DateRange::parse("2024-01-01", "2024-01-02").unwrap();
        let hourly = pipeline.load_hourly(location(), range).await;
        assert!(!hourly.derived_from_daily);
        assert_eq!(hourly.len(), 48);
        assert!(hourly.iter().all(|r| !r.is_synthetic_from_daily));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_load_still_settles() {
        let (source, calls) = CountingSource::new(
            SourceKind::PrimaryService,
            Behavior::Slow(Duration::from_millis(100)),
        );
        let pipeline = CachePipeline::builder().source(source).build();

        let waiter = timeout(
            Duration::from_millis(10),
            pipeline.load_daily(location(), january()),
        )
        .await;
        assert!(waiter.is_err());
        assert_eq!(pipeline.cached_entries().await, 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(pipeline.cached_entries().await, 1);
        assert!(pipeline.inner.state.lock().await.in_flight.is_empty());

        pipeline.load_daily(location(), january()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cache_forces_refetch() {
        let (source, calls) = CountingSource::new(SourceKind::PrimaryService, Behavior::Records);
        let pipeline = CachePipeline::builder().source(source).build();

        pipeline.load_daily(location(), january()).await;
        pipeline.clear_cache().await;
        assert_eq!(pipeline.cached_entries().await, 0);

        pipeline.load_daily(location(), january()).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_during_load_discards_result() {
        let (source, calls) = CountingSource::new(
            SourceKind::PrimaryService,
            Behavior::Slow(Duration::from_millis(100)),
        );
        let pipeline = CachePipeline::builder().source(source).build();

        let loader = pipeline.clone();
        let handle = tokio::spawn(async move { loader.load_daily(location(), january()).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        pipeline.clear_cache().await;

        let dataset = handle.await.unwrap();
        assert_eq!(dataset.len(), 31);
        assert_eq!(pipeline.cached_entries().await, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
