//! Flat rows for reporting headway results.
//!
//! Supports pretty-printing, JSON logging, and CSV to any writer.

use std::io::Write;

use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime};
use csv::WriterBuilder;
use serde::Serialize;
use tracing::{debug, info};

use crate::model::{Headway, RouteDay};
use crate::pipeline::{RouteReport, StopReport};
use crate::stats::HeadwaySummary;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One headway record per row.
#[derive(Debug, Serialize)]
pub struct HeadwayRow {
    pub route_id: String,
    pub service_date: NaiveDate,
    pub stop_id: String,
    pub direction: String,
    pub time: String,
    pub previous_time: Option<String>,
    pub headway_minutes: Option<f64>,
}

/// One stop+direction per row. Statistic columns are empty when there is
/// not enough data.
#[derive(Debug, Serialize)]
pub struct SummaryRow {
    pub route_id: String,
    pub service_date: NaiveDate,
    pub stop_id: String,
    pub direction: String,
    pub events: usize,
    pub status: &'static str,
    pub headways: Option<usize>,
    pub mean: Option<f64>,
    pub stddev: Option<f64>,
    pub min: Option<f64>,
    pub p25: Option<f64>,
    pub median: Option<f64>,
    pub p75: Option<f64>,
    pub max: Option<f64>,
    pub awt: Option<f64>,
}

fn format_time(t: NaiveDateTime) -> String {
    t.format(TIME_FORMAT).to_string()
}

fn headway_row(route_day: &RouteDay, h: &Headway) -> HeadwayRow {
    HeadwayRow {
        route_id: route_day.route_id.clone(),
        service_date: route_day.service_date,
        stop_id: h.stop_id.clone(),
        direction: h.direction.clone(),
        time: format_time(h.time),
        previous_time: h.previous.map(format_time),
        headway_minutes: h.minutes(),
    }
}

pub fn headway_rows(report: &RouteReport) -> Vec<HeadwayRow> {
    report
        .headways()
        .map(|h| headway_row(&report.route_day, h))
        .collect()
}

/// Headway rows for a single stop+direction.
pub fn stop_headway_rows(route_day: &RouteDay, stop: &StopReport) -> Vec<HeadwayRow> {
    stop.headways
        .iter()
        .map(|h| headway_row(route_day, h))
        .collect()
}

pub fn summary_row(route_day: &RouteDay, stop: &StopReport) -> SummaryRow {
    let stats = stop.summary.stats();
    SummaryRow {
        route_id: route_day.route_id.clone(),
        service_date: route_day.service_date,
        stop_id: stop.key.stop_id.clone(),
        direction: stop.key.direction.clone(),
        events: stop.headways.len(),
        status: match stop.summary {
            HeadwaySummary::Available(_) => "ok",
            HeadwaySummary::InsufficientData => "insufficient_data",
        },
        headways: stats.map(|s| s.count),
        mean: stats.map(|s| s.mean),
        stddev: stats.map(|s| s.stddev),
        min: stats.map(|s| s.min),
        p25: stats.map(|s| s.p25),
        median: stats.map(|s| s.median),
        p75: stats.map(|s| s.p75),
        max: stats.map(|s| s.max),
        awt: stop.wait.awt.minutes(),
    }
}

pub fn summary_rows(report: &RouteReport) -> Vec<SummaryRow> {
    report
        .stops
        .values()
        .map(|stop| summary_row(&report.route_day, stop))
        .collect()
}

/// Serializes rows as CSV with a header line.
pub fn write_csv<W: Write, T: Serialize>(writer: W, rows: &[T]) -> Result<()> {
    debug!(rows = rows.len(), "Writing CSV rows");

    let mut writer = WriterBuilder::new().has_headers(true).from_writer(writer);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}

/// Logs the route-wide statistics using Rust's debug pretty-print format.
pub fn print_pretty(report: &RouteReport) {
    debug!("{:#?}", report.route_summary);
}

/// Logs the route-wide statistics as pretty-printed JSON.
pub fn print_json(report: &RouteReport) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(&report.route_summary)?);
    Ok(())
}
