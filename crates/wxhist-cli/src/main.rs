use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use wxhist_aggregate::ChartSeries;
use wxhist_cli::{location_from, HistoryService};
use wxhist_config::AppConfig;
use wxhist_core::{LabelStyle, Location};

#[derive(Debug, Parser)]
#[command(name = "wxhist", version, about = "Historical weather aggregation and statistics")]
struct Cli {
    /// Latitude in degrees (defaults to the configured location)
    #[arg(long, global = true, allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Longitude in degrees (defaults to the configured location)
    #[arg(long, global = true, allow_hyphen_values = true)]
    lon: Option<f64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Summary and extremes of daily records between two dates
    Range { start: String, end: String },
    /// Summary and extremes of one calendar month
    Month { year: i32, month: u32 },
    /// Summary and extremes of hourly records between two dates
    Hourly { start: String, end: String },
    /// Chart series of daily records between two dates
    Chart {
        start: String,
        end: String,
        /// hour, day, week, month, year, decade or century; automatic when omitted
        #[arg(long, short)]
        granularity: Option<String>,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Observability
    wxhist_obs::init_pretty("wxhist");

    // Config
    let cfg = AppConfig::load()?;
    let default_location = location_from(&cfg.location());
    let location = Location::new(
        cli.lat.unwrap_or(default_location.latitude),
        cli.lon.unwrap_or(default_location.longitude),
    );

    let service = HistoryService::from_config(&cfg, None)?;

    match cli.command {
        Command::Range { start, end } => {
            let dataset = service.load_date_range(&start, &end, location).await?;
            print_json(&service.report(&dataset).await)
        }
        Command::Month { year, month } => {
            let dataset = service.load_historical_data(year, month, location).await?;
            print_json(&service.report(&dataset).await)
        }
        Command::Hourly { start, end } => {
            let dataset = service.load_hourly_date_range(&start, &end, location).await?;
            print_json(&service.report(&dataset).await)
        }
        Command::Chart {
            start,
            end,
            granularity,
        } => {
            let dataset = service.load_date_range(&start, &end, location).await?;
            let (granularity, series) = service.chart_series(dataset.records(), granularity.as_deref())?;
            let labels = series.labels(granularity, LabelStyle::Short);
            let guidance = granularity.point_guidance();
            let points = match series {
                ChartSeries::Raw(records) => serde_json::to_value(records)?,
                ChartSeries::Buckets(buckets) => serde_json::to_value(buckets)?,
            };
            print_json(&json!({
                "source": dataset.source,
                "granularity": granularity,
                "guidance": { "min": guidance.min, "max": guidance.max },
                "labels": labels,
                "points": points,
            }))
        }
    }
}
