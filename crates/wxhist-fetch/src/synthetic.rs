//! Deterministic synthetic weather used when no real source answers

use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::TAU;
use tracing::info;
use wxhist_core::{DailyRecord, DataSource, DateRange, Location, Metrics, SourceKind};

/// Generates physically plausible placeholder records.
///
/// Values are a pure function of (location, year, month, day): every month
/// draws from a generator seeded by its (year, month), so a date yields the
/// same values regardless of the requested range.
#[derive(Debug, Clone, Default)]
pub struct SyntheticSource;

impl SyntheticSource {
    pub fn new() -> Self {
        Self
    }

    /// Records for every day in `range`
    pub fn generate(&self, location: &Location, range: &DateRange) -> Vec<DailyRecord> {
        let mut records = Vec::with_capacity(range.days().max(0) as usize);
        let mut month_start = first_of_month(range.start());

        while month_start <= range.end() {
            records.extend(
                month_series(location, month_start)
                    .into_iter()
                    .filter(|r| range.contains(r.date)),
            );
            month_start = match next_month(month_start) {
                Some(next) => next,
                None => break,
            };
        }
        records
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn next_month(date: NaiveDate) -> Option<NaiveDate> {
    if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
}

fn month_seed(year: i32, month: u32) -> u64 {
    (year as i64 * 100 + month as i64) as u64
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Seasonal position in [-1, 1]: -1 in deep winter, 1 in high summer
fn seasonal_cycle(location: &Location, date: NaiveDate) -> f64 {
    // Coldest around mid-January in the northern hemisphere
    let phase = (date.ordinal() as f64 - 15.0) / 365.25 * TAU;
    let northern = -phase.cos();
    if location.latitude < 0.0 {
        -northern
    } else {
        northern
    }
}

fn month_series(location: &Location, first: NaiveDate) -> Vec<DailyRecord> {
    let mut rng = StdRng::seed_from_u64(month_seed(first.year(), first.month()));
    let lat = location.latitude.abs().min(90.0);
    let mean_temp = 28.0 - 0.35 * lat;
    let amplitude = (2.0 + 0.2 * lat).min(20.0);

    let mut records = Vec::with_capacity(31);
    let mut day = Some(first);

    while let Some(date) = day.filter(|d| d.month() == first.month()) {
        let season = seasonal_cycle(location, date);

        // Draw every value unconditionally so the stream stays aligned per day
        let noise: f64 = rng.gen_range(-3.0..3.0);
        let low_spread: f64 = rng.gen_range(2.0..7.0);
        let high_spread: f64 = rng.gen_range(2.0..8.0);
        let wet = rng.gen_bool(0.3);
        let rain: f64 = rng.gen_range(0.1..12.0);
        let wind: f64 = rng.gen_range(5.0..35.0);
        let humidity: f64 = rng.gen_range(55.0..90.0);
        let cloudiness: f64 = rng.gen_range(0.0..1.0);

        let temp_avg = mean_temp + amplitude * season + noise;
        let precipitation = if wet { rain } else { 0.0 };
        let day_length = (12.0 + 4.0 * season * (lat / 90.0) * 2.0).clamp(0.0, 18.0);
        let sunshine = day_length * (1.0 - cloudiness) * if wet { 0.4 } else { 1.0 };

        let weather_code = match (wet, precipitation, temp_avg, sunshine) {
            (true, _, t, _) if t < 0.0 => 71,
            (true, p, _, _) if p >= 5.0 => 63,
            (true, _, _, _) => 61,
            (false, _, _, s) if s >= 8.0 => 0,
            (false, _, _, s) if s >= 4.0 => 2,
            _ => 3,
        };

        records.push(DailyRecord::new(
            date,
            Metrics {
                temp_avg: Some(round1(temp_avg)),
                temp_min: Some(round1(temp_avg - low_spread)),
                temp_max: Some(round1(temp_avg + high_spread)),
                precipitation: Some(round1(precipitation)),
                wind_speed: Some(round1(wind)),
                humidity: Some(round1((humidity + if wet { 10.0 } else { 0.0 }).min(100.0))),
                sunshine_hours: Some(round1(sunshine)),
                weather_code: Some(weather_code),
            },
        ));
        day = date.succ_opt();
    }
    records
}

#[async_trait::async_trait]
impl DataSource for SyntheticSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Synthetic
    }

    async fn fetch_daily(&self, location: &Location, range: &DateRange) -> Result<Vec<DailyRecord>> {
        info!(%location, %range, "Generating synthetic daily records");
        Ok(self.generate(location, range))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn berlin() -> Location {
        Location::new(52.52, 13.41)
    }

    #[test]
    fn test_covers_every_day() {
        let range = DateRange::parse("2023-11-20", "2024-02-10").unwrap();
        let records = SyntheticSource::new().generate(&berlin(), &range);

        assert_eq!(records.len() as i64, range.days());
        assert!(records.windows(2).all(|w| w[0].date < w[1].date));
        assert_eq!(records[0].date, range.start());
        assert_eq!(records.last().unwrap().date, range.end());
    }

    #[test]
    fn test_deterministic_independent_of_range() {
        let source = SyntheticSource::new();
        let wide = source.generate(&berlin(), &DateRange::parse("2024-03-01", "2024-03-31").unwrap());
        let narrow = source.generate(&berlin(), &DateRange::parse("2024-03-10", "2024-03-12").unwrap());

        assert_eq!(&wide[9..12], &narrow[..]);
        assert_eq!(wide, source.generate(&berlin(), &DateRange::parse("2024-03-01", "2024-03-31").unwrap()));
    }

    #[test]
    fn test_values_are_plausible() {
        let range = DateRange::parse("2020-01-01", "2020-12-31").unwrap();
        for record in SyntheticSource::new().generate(&berlin(), &range) {
            let m = record.metrics;
            let (min, avg, max) = (m.temp_min.unwrap(), m.temp_avg.unwrap(), m.temp_max.unwrap());
            assert!(min <= avg && avg <= max, "{record:?}");
            assert!((-40.0..=50.0).contains(&avg));
            assert!(m.precipitation.unwrap() >= 0.0);
            assert!((0.0..=100.0).contains(&m.humidity.unwrap()));
            assert!((0.0..=24.0).contains(&m.sunshine_hours.unwrap()));
        }
    }

    #[test]
    fn test_seasons_follow_hemisphere() {
        let mean = |loc: Location, range: &str| {
            let (start, end) = range.split_once('/').unwrap();
            let records = SyntheticSource::new().generate(&loc, &DateRange::parse(start, end).unwrap());
            records.iter().filter_map(|r| r.metrics.temp_avg).sum::<f64>() / records.len() as f64
        };
        let sydney = Location::new(-33.87, 151.21);

        assert!(mean(berlin(), "2021-07-01/2021-07-31") > mean(berlin(), "2021-01-01/2021-01-31"));
        assert!(mean(sydney, "2021-01-01/2021-01-31") > mean(sydney, "2021-07-01/2021-07-31"));
    }
}
