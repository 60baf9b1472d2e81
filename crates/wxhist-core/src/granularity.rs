//! Time granularities used to bucket raw samples
//!
//! Bucket keys are zero-padded so that lexicographic order of keys follows
//! chronological order of the dates they were derived from. Years outside
//! `0..=9999` get a prefixed six-digit form that keeps that order over the
//! whole `chrono` date range.

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Granularity errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GranularityError {
    #[error("Unknown granularity: {0}")]
    Unknown(String),
}

/// Supported time units, finest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hour,
    Day,
    Week,
    Month,
    Year,
    Decade,
    Century,
}

/// Label rendering style
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelStyle {
    Short,
    Long,
}

/// Suggested number of points to render at a granularity. Presentation only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointGuidance {
    pub min: usize,
    pub max: usize,
}

impl Granularity {
    pub const ALL: [Granularity; 7] = [
        Granularity::Hour,
        Granularity::Day,
        Granularity::Week,
        Granularity::Month,
        Granularity::Year,
        Granularity::Decade,
        Granularity::Century,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Hour => "hour",
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
            Granularity::Year => "year",
            Granularity::Decade => "decade",
            Granularity::Century => "century",
        }
    }

    /// Identity of the bucket `at` falls into
    pub fn key(&self, at: NaiveDateTime) -> String {
        let date = at.date();
        match self {
            Granularity::Hour => format!(
                "{}-{:02}-{:02}T{:02}",
                year_key(date.year()),
                date.month(),
                date.day(),
                at.hour()
            ),
            Granularity::Day => format!(
                "{}-{:02}-{:02}",
                year_key(date.year()),
                date.month(),
                date.day()
            ),
            Granularity::Week => {
                let week = date.iso_week();
                format!("{}-W{:02}", year_key(week.year()), week.week())
            }
            Granularity::Month => format!("{}-{:02}", year_key(date.year()), date.month()),
            Granularity::Year => year_key(date.year()),
            Granularity::Decade => year_key(date.year().div_euclid(10) * 10),
            Granularity::Century => year_key(date.year().div_euclid(100) * 100),
        }
    }

    /// Axis / tooltip label for a bucket starting at `at`
    pub fn label(&self, at: NaiveDateTime, style: LabelStyle) -> String {
        let date = at.date();
        match (self, style) {
            (Granularity::Hour, LabelStyle::Short) => at.format("%H:00").to_string(),
            (Granularity::Hour, LabelStyle::Long) => at.format("%-d %b %Y %H:00").to_string(),
            (Granularity::Day, LabelStyle::Short) => date.format("%b %-d").to_string(),
            (Granularity::Day, LabelStyle::Long) => date.format("%-d %B %Y").to_string(),
            (Granularity::Week, LabelStyle::Short) => format!("W{:02}", date.iso_week().week()),
            (Granularity::Week, LabelStyle::Long) => {
                let week = date.iso_week();
                format!("Week {}, {}", week.week(), week.year())
            }
            (Granularity::Month, LabelStyle::Short) => date.format("%b").to_string(),
            (Granularity::Month, LabelStyle::Long) => date.format("%B %Y").to_string(),
            (Granularity::Year, _) => date.year().to_string(),
            (Granularity::Decade, LabelStyle::Short) => {
                format!("{}s", date.year().div_euclid(10) * 10)
            }
            (Granularity::Decade, LabelStyle::Long) => {
                let start = date.year().div_euclid(10) * 10;
                format!("{}-{}", start, start + 9)
            }
            (Granularity::Century, LabelStyle::Short) => {
                format!("{}s", date.year().div_euclid(100) * 100)
            }
            (Granularity::Century, LabelStyle::Long) => {
                let n = date.year().div_euclid(100) + 1;
                format!("{}{} century", n, ordinal_suffix(n))
            }
        }
    }

    pub fn point_guidance(&self) -> PointGuidance {
        let (min, max) = match self {
            Granularity::Hour => (24, 168),
            Granularity::Day => (7, 90),
            Granularity::Week => (8, 104),
            Granularity::Month => (6, 120),
            Granularity::Year => (2, 100),
            Granularity::Decade => (2, 20),
            Granularity::Century => (1, 10),
        };
        PointGuidance { min, max }
    }
}

/// Year part of a bucket key. `-` sorts before the digits and `~` after
/// them; negative years are stored as their complement to 10^6 so that
/// earlier years sort first.
fn year_key(year: i32) -> String {
    match year {
        0..=9999 => format!("{year:04}"),
        i32::MIN..=-1 => format!("-{:06}", 1_000_000 + year),
        _ => format!("~{year:06}"),
    }
}

fn ordinal_suffix(n: i32) -> &'static str {
    match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = GranularityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        Granularity::ALL
            .into_iter()
            .find(|g| g.as_str() == name)
            .ok_or_else(|| GranularityError::Unknown(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_time(NaiveTime::from_hms_opt(h, 0, 0).unwrap())
    }

    #[test]
    fn test_keys_per_granularity() {
        let ts = at(2024, 3, 5, 14);
        let rendered: Vec<String> = Granularity::ALL
            .iter()
            .map(|g| format!("{}: {}", g, g.key(ts)))
            .collect();

        insta::assert_snapshot!(rendered.join("\n"), @r"
        hour: 2024-03-05T14
        day: 2024-03-05
        week: 2024-W10
        month: 2024-03
        year: 2024
        decade: 2020
        century: 2000
        ");
    }

    #[test]
    fn test_week_key_uses_iso_year() {
        // 2019-12-30 is the Monday of ISO week 1 of 2020
        assert_eq!(Granularity::Week.key(at(2019, 12, 30, 0)), "2020-W01");
        // 2021-01-03 still belongs to ISO week 53 of 2020
        assert_eq!(Granularity::Week.key(at(2021, 1, 3, 0)), "2020-W53");
    }

    #[test]
    fn test_keys_preserve_order() {
        let start = NaiveDate::from_ymd_opt(1998, 12, 20).unwrap();
        let days: Vec<NaiveDateTime> = start
            .iter_days()
            .take(800)
            .map(|d| d.and_time(NaiveTime::MIN))
            .collect();

        for granularity in Granularity::ALL {
            for pair in days.windows(2) {
                let (a, b) = (granularity.key(pair[0]), granularity.key(pair[1]));
                assert!(a <= b, "{granularity}: {a} > {b}");
            }
        }
    }

    #[test]
    fn test_keys_preserve_order_beyond_four_digit_years() {
        let dates = [
            NaiveDate::MIN,
            NaiveDate::from_ymd_opt(-10, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(-5, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(-1, 12, 31).unwrap(),
            NaiveDate::from_ymd_opt(0, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(9999, 12, 31).unwrap(),
            NaiveDate::from_ymd_opt(10000, 1, 1).unwrap(),
            NaiveDate::MAX,
        ];

        for granularity in Granularity::ALL {
            for pair in dates.windows(2) {
                let a = granularity.key(pair[0].and_time(NaiveTime::MIN));
                let b = granularity.key(pair[1].and_time(NaiveTime::MIN));
                assert!(a <= b, "{granularity}: {a} > {b}");
            }
        }

        assert_eq!(Granularity::Year.key(at(-10, 1, 1, 0)), "-999990");
        assert_eq!(Granularity::Year.key(at(10000, 1, 1, 0)), "~010000");
        assert_eq!(Granularity::Decade.key(at(-5, 1, 1, 0)), "-999990");
    }

    #[test]
    fn test_labels() {
        let ts = at(2024, 3, 5, 14);
        assert_eq!(Granularity::Hour.label(ts, LabelStyle::Short), "14:00");
        assert_eq!(Granularity::Day.label(ts, LabelStyle::Short), "Mar 5");
        assert_eq!(Granularity::Day.label(ts, LabelStyle::Long), "5 March 2024");
        assert_eq!(Granularity::Week.label(ts, LabelStyle::Long), "Week 10, 2024");
        assert_eq!(Granularity::Month.label(ts, LabelStyle::Long), "March 2024");
        assert_eq!(Granularity::Decade.label(ts, LabelStyle::Long), "2020-2029");
        assert_eq!(
            Granularity::Century.label(ts, LabelStyle::Long),
            "21st century"
        );
        assert_eq!(
            Granularity::Century.label(at(1911, 1, 1, 0), LabelStyle::Long),
            "20th century"
        );
    }

    #[test]
    fn test_parse_granularity() {
        assert_eq!("Month".parse::<Granularity>(), Ok(Granularity::Month));
        assert_eq!(" decade ".parse::<Granularity>(), Ok(Granularity::Decade));
        assert_eq!(
            "fortnight".parse::<Granularity>(),
            Err(GranularityError::Unknown("fortnight".to_string()))
        );
    }
}
