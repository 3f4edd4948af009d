//! CLI entry point for the bus headway tool.
//!
//! Provides subcommands for scheduled headways from a timetable export and
//! actual headways from scraped vehicle positions.

mod infra;

use crate::infra::bustracker::BusTrackerClient;
use crate::infra::ghostbuses::GhostBusClient;
use crate::infra::timetable::TimetableCsvProvider;
use anyhow::Result;
use bus_headways::config::AnalysisConfig;
use bus_headways::model::{RouteDay, StopKey};
use bus_headways::output::{
    headway_rows, print_json, print_pretty, stop_headway_rows, summary_row, summary_rows, write_csv,
};
use bus_headways::pipeline::{
    RouteReport, actual_headways, scheduled_headways, scheduled_stop_headways,
};
use bus_headways::services::SampleWindow;
use bus_headways::services::position_api::ServiceOffset;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "bus_headways")]
#[command(about = "Scheduled and actual bus headways per stop", long_about = None)]
struct Cli {
    /// Optional JSON config file; values override the environment
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scheduled headways from a timetable export
    Scheduled {
        /// Route id, e.g. "55"
        #[arg(short, long)]
        route: String,

        /// Service date (YYYY-MM-DD)
        #[arg(short, long)]
        date: NaiveDate,

        /// CSV of resolved stop visits
        #[arg(short, long)]
        timetable: String,

        /// Limit output to one stop id
        #[arg(long, requires = "direction")]
        stop: Option<String>,

        /// Direction of travel at the stop, e.g. "East"
        #[arg(long, requires = "stop")]
        direction: Option<String>,

        /// Write per-stop statistics instead of headway rows
        #[arg(long, default_value_t = false)]
        summary: bool,

        /// CSV file to write (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Actual headways from vehicle positions and pattern topology
    Actual {
        /// Route id, e.g. "55"
        #[arg(short, long)]
        route: String,

        /// Service date (YYYY-MM-DD)
        #[arg(short, long)]
        date: NaiveDate,

        /// Start of the service day as hh:mm after midnight
        #[arg(long)]
        start: Option<ServiceOffset>,

        /// End of the service day as hh:mm after midnight; may exceed 24:00
        #[arg(long)]
        end: Option<ServiceOffset>,

        /// Write per-stop statistics instead of headway rows
        #[arg(long, default_value_t = false)]
        summary: bool,

        /// CSV file to write (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/bus_headways.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("bus_headways.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = AnalysisConfig::from_env()?.with_file(cli.config.as_deref())?;

    match cli.command {
        Commands::Scheduled {
            route,
            date,
            timetable,
            stop,
            direction,
            summary,
            output,
        } => {
            let provider = TimetableCsvProvider::new(timetable);

            match (stop, direction) {
                (Some(stop_id), Some(direction)) => {
                    let key = StopKey::new(stop_id, direction);
                    let stop = scheduled_stop_headways(&provider, &route, date, &key).await?;
                    info!(stop = %key, windows = stop.windows.len(), "Active service windows");

                    let route_day = RouteDay {
                        route_id: route,
                        service_date: date,
                    };
                    if summary {
                        write_rows(output.as_deref(), &[summary_row(&route_day, &stop)])?;
                    } else {
                        write_rows(output.as_deref(), &stop_headway_rows(&route_day, &stop))?;
                    }
                }
                _ => {
                    let report = scheduled_headways(&provider, &route, date).await?;
                    write_report(&report, summary, output.as_deref())?;
                }
            }
        }
        Commands::Actual {
            route,
            date,
            start,
            end,
            summary,
            output,
        } => {
            let window = SampleWindow::new(
                date,
                start.unwrap_or(config.service_day_start),
                end.unwrap_or(config.service_day_end),
            )?;
            let positions = GhostBusClient::new(&config.positions_base_url)?;
            let patterns = BusTrackerClient::new(
                &config.bustracker_base_url,
                &config.bustracker_api_key,
                config.pattern_batch_size,
            )?;

            let report = actual_headways(&positions, &patterns, &route, &window).await?;
            write_report(&report, summary, output.as_deref())?;
        }
    }

    Ok(())
}

/// Logs the route-wide picture and writes the requested rows.
fn write_report(report: &RouteReport, summary: bool, output: Option<&str>) -> Result<()> {
    print_pretty(report);
    print_json(report)?;

    for anomaly in &report.anomalies {
        warn!(kind = anomaly.kind(), detail = ?anomaly, "Excluded record");
    }

    if summary {
        write_rows(output, &summary_rows(report))
    } else {
        write_rows(output, &headway_rows(report))
    }
}

fn write_rows<T: serde::Serialize>(output: Option<&str>, rows: &[T]) -> Result<()> {
    match output {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            write_csv(file, rows)?;
            info!(path, rows = rows.len(), "Wrote CSV");
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            write_csv(&mut lock, rows)?;
            lock.flush()?;
        }
    }
    Ok(())
}
