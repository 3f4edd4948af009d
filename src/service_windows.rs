//! Detects the continuous in-service windows at a stop+direction from the
//! timetable, so that out-of-service gaps are never reported as headways.

use std::collections::BTreeMap;

use tracing::debug;

use crate::model::{ScheduledStopVisit, ServiceWindow, StopKey};

/// Per-service `[first visit, last visit]` ranges at one stop+direction,
/// sorted by start.
pub fn service_ranges(visits: &[ScheduledStopVisit], key: &StopKey) -> Vec<ServiceWindow> {
    let mut by_service: BTreeMap<&str, ServiceWindow> = BTreeMap::new();

    for visit in visits.iter().filter(|v| &v.key() == key) {
        by_service
            .entry(visit.service_id.as_str())
            .and_modify(|range| {
                range.start = range.start.min(visit.arrival);
                range.end = range.end.max(visit.arrival);
            })
            .or_insert(ServiceWindow {
                start: visit.arrival,
                end: visit.arrival,
            });
    }

    let mut ranges: Vec<ServiceWindow> = by_service.into_values().collect();
    ranges.sort_by_key(|r| (r.start, r.end));
    ranges
}

/// Unions sorted ranges into maximal windows.
///
/// A window closes only when the next range starts strictly after its end,
/// so touching ranges merge.
pub fn merge_ranges(ranges: &[ServiceWindow]) -> Vec<ServiceWindow> {
    let mut windows = Vec::new();
    let mut open: Option<ServiceWindow> = None;

    for range in ranges {
        open = match open {
            None => Some(*range),
            Some(mut window) if range.start <= window.end => {
                window.end = window.end.max(range.end);
                Some(window)
            }
            Some(window) => {
                windows.push(window);
                Some(*range)
            }
        };
    }

    if let Some(window) = open {
        windows.push(window);
    }

    windows
}

/// Ordered, non-overlapping in-service windows at one stop+direction.
pub fn active_service_windows(visits: &[ScheduledStopVisit], key: &StopKey) -> Vec<ServiceWindow> {
    let ranges = service_ranges(visits, key);
    let windows = merge_ranges(&ranges);

    debug!(
        stop = %key,
        services = ranges.len(),
        windows = windows.len(),
        "Detected active service windows"
    );

    windows
}
