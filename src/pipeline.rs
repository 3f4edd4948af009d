//! The scheduled and actual headway flows, end to end.
//!
//! The `*_report` functions are pure over already-fetched inputs; the async
//! entry points pull those inputs from the providers first. Any provider
//! failure aborts the query.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::{info, warn};

use crate::crossing::crossing_events;
use crate::error::{Anomaly, HeadwayError};
use crate::headways::{HeadwayMode, compute_headways};
use crate::intervals::build_intervals;
use crate::model::{
    Headway, Pattern, PatternId, PositionSample, RouteDay, ScheduledStopVisit, ServiceWindow,
    StopKey, StopLocation,
};
use crate::service_windows::active_service_windows;
use crate::services::{PatternProvider, PositionProvider, SampleWindow, ScheduleProvider};
use crate::stats::{HeadwaySummary, StopWaitTime, describe, stop_wait_time};

/// Everything computed for one stop+direction.
#[derive(Debug, Clone, Serialize)]
pub struct StopReport {
    pub key: StopKey,
    pub headways: Vec<Headway>,
    pub summary: HeadwaySummary,
    pub wait: StopWaitTime,
    /// Active service windows; only populated by the scheduled flow.
    pub windows: Vec<ServiceWindow>,
}

impl StopReport {
    fn new(key: StopKey, headways: Vec<Headway>, windows: Vec<ServiceWindow>) -> Self {
        let summary = describe(&headways);
        let wait = stop_wait_time(&key, &headways);
        Self {
            key,
            headways,
            summary,
            wait,
            windows,
        }
    }
}

/// Headways for every stop+direction of one route on one service date.
#[derive(Debug, Clone, Serialize)]
pub struct RouteReport {
    pub route_day: RouteDay,
    pub stops: BTreeMap<StopKey, StopReport>,
    /// Statistics over every usable headway of the route.
    pub route_summary: HeadwaySummary,
    pub anomalies: Vec<Anomaly>,
}

impl RouteReport {
    fn new(route_day: RouteDay, stops: BTreeMap<StopKey, StopReport>, anomalies: Vec<Anomaly>) -> Self {
        let route_summary = describe(stops.values().flat_map(|s| s.headways.iter()));
        Self {
            route_day,
            stops,
            route_summary,
            anomalies,
        }
    }

    pub fn stop(&self, key: &StopKey) -> Option<&StopReport> {
        self.stops.get(key)
    }

    pub fn headways(&self) -> impl Iterator<Item = &Headway> {
        self.stops.values().flat_map(|s| s.headways.iter())
    }
}

/// Scheduled headways for every stop+direction in `visits`.
///
/// Each stop gets its own active service windows; a visit at a window
/// start never inherits a headway from the previous window.
pub fn scheduled_report(route_day: RouteDay, visits: &[ScheduledStopVisit]) -> RouteReport {
    let mut by_stop: BTreeMap<StopKey, Vec<ScheduledStopVisit>> = BTreeMap::new();
    for visit in visits.iter().filter(|v| v.route_id == route_day.route_id) {
        by_stop.entry(visit.key()).or_default().push(visit.clone());
    }

    let mut anomalies = Vec::new();
    let mut stops = BTreeMap::new();

    for (key, stop_visits) in by_stop {
        let windows = active_service_windows(&stop_visits, &key);

        let mut times: Vec<NaiveDateTime> = stop_visits.iter().map(|v| v.arrival).collect();
        times.sort();

        let series = compute_headways(&key, &times, HeadwayMode::Scheduled(&windows));
        anomalies.extend(series.anomalies);
        stops.insert(key.clone(), StopReport::new(key, series.headways, windows));
    }

    RouteReport::new(route_day, stops, anomalies)
}

/// Actual headways from interpolated stop crossings.
///
/// Every stop on the given patterns appears in the report, even when no
/// vehicle was seen crossing it.
pub fn actual_report(route_day: RouteDay, samples: &[PositionSample], patterns: &[Pattern]) -> RouteReport {
    let intervals = build_intervals(samples, &route_day.route_id);
    let stops: Vec<StopLocation> = patterns.iter().flat_map(Pattern::stops).collect();
    let crossings = crossing_events(&stops, &intervals);

    let mut anomalies = intervals.anomalies;
    let mut reports = BTreeMap::new();

    for (key, events) in crossings {
        let times: Vec<NaiveDateTime> = events.iter().map(|e| e.timestamp).collect();
        let series = compute_headways(&key, &times, HeadwayMode::Actual);
        anomalies.extend(series.anomalies);
        reports.insert(key.clone(), StopReport::new(key, series.headways, Vec::new()));
    }

    RouteReport::new(route_day, reports, anomalies)
}

/// Pattern ids seen in the samples of one route, ascending.
pub fn route_pattern_ids(samples: &[PositionSample], route_id: &str) -> Vec<PatternId> {
    samples
        .iter()
        .filter(|s| s.route_id == route_id)
        .map(|s| s.pattern_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[tracing::instrument(skip(provider))]
pub async fn scheduled_headways<P: ScheduleProvider + ?Sized>(
    provider: &P,
    route_id: &str,
    service_date: NaiveDate,
) -> Result<RouteReport, HeadwayError> {
    let visits = provider
        .stop_visits(route_id, service_date)
        .await
        .map_err(|e| HeadwayError::upstream("schedule provider", e))?;

    if visits.is_empty() {
        return Err(HeadwayError::MissingData {
            what: "scheduled visits",
            key: format!("route {route_id} on {service_date}"),
        });
    }

    let report = scheduled_report(
        RouteDay {
            route_id: route_id.to_string(),
            service_date,
        },
        &visits,
    );
    log_report(&report);
    Ok(report)
}

/// Scheduled headways at a single stop+direction.
pub async fn scheduled_stop_headways<P: ScheduleProvider + ?Sized>(
    provider: &P,
    route_id: &str,
    service_date: NaiveDate,
    key: &StopKey,
) -> Result<StopReport, HeadwayError> {
    let mut report = scheduled_headways(provider, route_id, service_date).await?;
    report
        .stops
        .remove(key)
        .ok_or_else(|| HeadwayError::MissingData {
            what: "scheduled visits",
            key: format!("stop {key} on route {route_id} on {service_date}"),
        })
}

#[tracing::instrument(skip(positions, patterns, window), fields(service_date = %window.service_date))]
pub async fn actual_headways<S, T>(
    positions: &S,
    patterns: &T,
    route_id: &str,
    window: &SampleWindow,
) -> Result<RouteReport, HeadwayError>
where
    S: PositionProvider + ?Sized,
    T: PatternProvider + ?Sized,
{
    let samples = positions
        .samples(window)
        .await
        .map_err(|e| HeadwayError::upstream("position provider", e))?;

    let pattern_ids = route_pattern_ids(&samples, route_id);
    if pattern_ids.is_empty() {
        return Err(HeadwayError::MissingData {
            what: "position samples",
            key: format!("route {route_id} on {}", window.service_date),
        });
    }

    let topology = patterns
        .patterns(&pattern_ids)
        .await
        .map_err(|e| HeadwayError::upstream("pattern provider", e))?;

    if topology.is_empty() {
        return Err(HeadwayError::MissingData {
            what: "pattern topology",
            key: format!("patterns {pattern_ids:?}"),
        });
    }

    let report = actual_report(
        RouteDay {
            route_id: route_id.to_string(),
            service_date: window.service_date,
        },
        &samples,
        &topology,
    );
    log_report(&report);
    Ok(report)
}

fn log_report(report: &RouteReport) {
    let headways = report.headways().filter(|h| h.duration.is_some()).count();
    info!(
        route_id = %report.route_day.route_id,
        service_date = %report.route_day.service_date,
        stops = report.stops.len(),
        headways,
        anomalies = report.anomalies.len(),
        "Headway report ready"
    );
    if !report.anomalies.is_empty() {
        let mut by_kind: BTreeMap<&str, usize> = BTreeMap::new();
        for anomaly in &report.anomalies {
            *by_kind.entry(anomaly.kind()).or_default() += 1;
        }
        warn!(?by_kind, "Records excluded from headway computation");
    }
}
