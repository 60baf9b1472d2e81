//! Historical weather service facade
//!
//! Ties the fetch pipeline, the aggregator and the statistics engine
//! together behind the operations a UI or the `wxhist` binary calls.

use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};
use wxhist_aggregate::{aggregate, chart_series, ChartSeries, GranularityChoice};
use wxhist_config::{AppConfig, LocationConfig};
use wxhist_core::{
    DailyRecord, DateRange, Granularity, GranularityError, HourlyRecord, Location, Observation,
    RangeError, Scheduler, SourceKind,
};
use wxhist_fetch::{
    CachePipeline, Dataset, FetchError, PipelineBuilder, RemoteArchiveSource, WeatherService,
};
use wxhist_stats::{Extremes, StatisticsSummary, TokioScheduler, DEFAULT_CHUNK_SIZE};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Range(#[from] RangeError),
    #[error(transparent)]
    Granularity(#[from] GranularityError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

pub fn location_from(cfg: &LocationConfig) -> Location {
    Location::new(cfg.latitude, cfg.longitude)
}

/// First to last day of a month, clamped to `today` for the running month
pub fn month_range(year: i32, month: u32, today: NaiveDate) -> ServiceResult<DateRange> {
    Ok(DateRange::month(year, month)?.clamp_end(today))
}

/// Summary and extremes of one dataset, with its provenance
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetReport<R> {
    pub source: SourceKind,
    pub derived_from_daily: bool,
    pub record_count: usize,
    pub summary: StatisticsSummary,
    pub extremes: Extremes<R>,
}

/// Entry point for historical data. Cheap to clone; clones share one cache.
#[derive(Clone)]
pub struct HistoryService {
    pipeline: CachePipeline,
    scheduler: Arc<dyn Scheduler>,
    chunk_size: usize,
}

impl HistoryService {
    pub fn new(pipeline: CachePipeline) -> Self {
        Self {
            pipeline,
            scheduler: Arc::new(TokioScheduler),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Build the source chain from configuration. `primary` is the host
    /// application's weather service, when it has one.
    pub fn from_config(
        cfg: &AppConfig,
        primary: Option<Arc<dyn WeatherService>>,
    ) -> ServiceResult<Self> {
        let archive =
            RemoteArchiveSource::new(&cfg.archive_url(), &cfg.timezone(), cfg.source_timeout())?;

        let mut builder: PipelineBuilder = CachePipeline::builder()
            .ttl(cfg.cache_ttl())
            .source_timeout(cfg.source_timeout())
            .remote_archive(archive);
        if let Some(service) = primary {
            builder = builder.primary(service);
        }

        info!(
            archive_url = %cfg.archive_url(),
            chunk_size = cfg.chunk_size(),
            "History service configured"
        );
        Ok(Self::new(builder.build()).with_chunk_size(cfg.chunk_size()))
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn pipeline(&self) -> &CachePipeline {
        &self.pipeline
    }

    /// Daily records of one calendar month
    pub async fn load_historical_data(
        &self,
        year: i32,
        month: u32,
        location: Location,
    ) -> ServiceResult<Dataset<DailyRecord>> {
        let today = chrono::Local::now().date_naive();
        let range = month_range(year, month, today)?;
        Ok(self.pipeline.load_daily(location, range).await)
    }

    /// Daily records between two ISO dates, inclusive
    pub async fn load_date_range(
        &self,
        start: &str,
        end: &str,
        location: Location,
    ) -> ServiceResult<Dataset<DailyRecord>> {
        let range = DateRange::parse(start, end)?;
        Ok(self.pipeline.load_daily(location, range).await)
    }

    /// Hourly records between two ISO dates. Falls back to one noon sample
    /// per day when no source has hourly data.
    pub async fn load_hourly_date_range(
        &self,
        start: &str,
        end: &str,
        location: Location,
    ) -> ServiceResult<Dataset<HourlyRecord>> {
        let range = DateRange::parse(start, end)?;
        Ok(self.pipeline.load_hourly(location, range).await)
    }

    /// Aggregate at a named granularity; an unknown name is an error
    pub fn aggregate_data_by_granularity<'a, R: Observation>(
        &self,
        data: &'a [R],
        granularity: &str,
    ) -> ServiceResult<ChartSeries<'a, R>> {
        let granularity: Granularity = granularity.parse()?;
        Ok(aggregate(data, granularity))
    }

    /// Chart-ready series, selecting the granularity unless one is given
    pub fn chart_series<'a, R: Observation>(
        &self,
        data: &'a [R],
        granularity: Option<&str>,
    ) -> ServiceResult<(Granularity, ChartSeries<'a, R>)> {
        let choice: GranularityChoice = granularity
            .map(str::parse::<Granularity>)
            .transpose()?
            .into();
        Ok(chart_series(data, choice))
    }

    pub fn calculate_stats<R: Observation>(&self, data: &[R]) -> StatisticsSummary {
        wxhist_stats::calculate_stats(data)
    }

    /// Statistics without monopolizing the executor. Inputs smaller than one
    /// chunk are computed in a single pass.
    pub async fn calculate_stats_async<R: Observation>(
        &self,
        data: &[R],
        mut on_progress: Option<&mut (dyn FnMut(u8) + Send)>,
    ) -> StatisticsSummary {
        let mut report = |percent: u8| {
            if let Some(callback) = on_progress.as_deref_mut() {
                callback(percent);
            }
        };

        if data.len() < self.chunk_size {
            let summary = wxhist_stats::calculate_stats(data);
            report(100);
            return summary;
        }

        debug!(records = data.len(), chunk_size = self.chunk_size, "Computing statistics in chunks");
        wxhist_stats::calculate_stats_async(data, self.scheduler.as_ref(), self.chunk_size, report)
            .await
    }

    pub fn find_extremes<R: Observation + Clone>(&self, data: &[R]) -> Extremes<R> {
        wxhist_stats::find_extremes(data)
    }

    /// Statistics and extremes of a loaded dataset
    pub async fn report<R: Observation + Clone>(&self, dataset: &Dataset<R>) -> DatasetReport<R> {
        DatasetReport {
            source: dataset.source,
            derived_from_daily: dataset.derived_from_daily,
            record_count: dataset.len(),
            summary: self.calculate_stats_async(dataset.records(), None).await,
            extremes: self.find_extremes(dataset.records()),
        }
    }

    /// Forget every cached dataset, e.g. after the location changed
    pub async fn clear_cache(&self) {
        self.pipeline.clear_cache().await;
    }
}
