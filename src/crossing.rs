//! Estimates when vehicles passed each stop by linear interpolation
//! inside the motion interval that straddles the stop.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, TimeDelta};
use tracing::{debug, trace};

use crate::error::HeadwayError;
use crate::intervals::IntervalSet;
use crate::model::{CrossingEvent, MotionInterval, StopKey, StopLocation};

/// Interpolated crossing time at `stop_distance`, rounded to the nearest minute.
///
/// Assumes constant speed across the interval. Ties round half to even, so
/// 08:02:30 becomes 08:02 and 08:03:30 becomes 08:04.
pub fn interpolate_crossing(
    interval: &MotionInterval,
    stop_distance: f64,
) -> Result<NaiveDateTime, HeadwayError> {
    if interval.is_degenerate() {
        return Err(HeadwayError::DegenerateInterval {
            vehicle_id: interval.vehicle_id.clone(),
            pattern_id: interval.pattern_id,
        });
    }

    let ratio = (stop_distance - interval.start_distance)
        / (interval.end_distance - interval.start_distance);
    let offset_ms = (interval.duration().num_milliseconds() as f64 * ratio).round() as i64;
    let estimate = interval.start_time + TimeDelta::milliseconds(offset_ms);

    round_to_minute(estimate)
}

/// Nearest whole minute; an exact half minute goes to the even minute.
fn round_to_minute(t: NaiveDateTime) -> Result<NaiveDateTime, HeadwayError> {
    let millis = t.and_utc().timestamp_millis();
    let mut minutes = millis.div_euclid(60_000);
    let rem = millis.rem_euclid(60_000);
    if rem > 30_000 || (rem == 30_000 && minutes.rem_euclid(2) == 1) {
        minutes += 1;
    }
    DateTime::from_timestamp(minutes * 60, 0)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| HeadwayError::InvalidInput(format!("timestamp out of range: {t}")))
}

/// Crossing events for one stop on one pattern.
///
/// Only intervals with `start < stop <= end` qualify. Degenerate intervals
/// are skipped before the test. No qualifying interval yields an empty list.
pub fn crossings_at_stop(stop: &StopLocation, intervals: &[MotionInterval]) -> Vec<CrossingEvent> {
    intervals
        .iter()
        .filter(|i| i.pattern_id == stop.pattern_id)
        .filter(|i| !i.is_degenerate())
        .filter(|i| i.straddles(stop.distance))
        .filter_map(|i| match interpolate_crossing(i, stop.distance) {
            Ok(timestamp) => Some(CrossingEvent {
                stop_id: stop.stop_id.clone(),
                direction: stop.direction.clone(),
                vehicle_id: i.vehicle_id.clone(),
                pattern_id: i.pattern_id,
                timestamp,
            }),
            Err(e) => {
                trace!(error = %e, "Skipping interval");
                None
            }
        })
        .collect()
}

/// Interpolates every stop independently per pattern, then merges the
/// results by stop and direction. Each merged list is sorted chronologically.
pub fn crossing_events(
    stops: &[StopLocation],
    intervals: &IntervalSet,
) -> BTreeMap<StopKey, Vec<CrossingEvent>> {
    let mut merged: BTreeMap<StopKey, Vec<CrossingEvent>> = BTreeMap::new();

    for stop in stops {
        let events = crossings_at_stop(stop, intervals.on_pattern(stop.pattern_id));
        trace!(
            stop_id = %stop.stop_id,
            pattern_id = stop.pattern_id,
            events = events.len(),
            "Interpolated stop"
        );
        merged.entry(stop.key()).or_default().extend(events);
    }

    for events in merged.values_mut() {
        events.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.vehicle_id.cmp(&b.vehicle_id))
        });
    }

    debug!(
        stops = merged.len(),
        events = merged.values().map(Vec::len).sum::<usize>(),
        "Merged crossing events"
    );

    merged
}
