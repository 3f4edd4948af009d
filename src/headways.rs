//! Consecutive time deltas over the events at one stop+direction.

use std::collections::BTreeSet;

use chrono::{NaiveDateTime, TimeDelta};
use tracing::warn;

use crate::error::Anomaly;
use crate::model::{Headway, ServiceWindow, StopKey};

/// Boundary handling applied on top of the plain pairwise deltas.
#[derive(Debug, Clone, Copy)]
pub enum HeadwayMode<'a> {
    /// Crossing events: only the first event lacks a predecessor.
    Actual,
    /// Timetable visits: every event at the start of an active service
    /// window also lacks one, whatever came before it.
    Scheduled(&'a [ServiceWindow]),
}

#[derive(Debug, Default)]
pub struct HeadwaySeries {
    pub headways: Vec<Headway>,
    pub anomalies: Vec<Anomaly>,
}

/// Computes `time[i] - time[i-1]` for each event in the given order.
///
/// Events are expected in chronological order. A negative delta is kept on
/// the record so the caller can see it, and reported as an anomaly.
pub fn compute_headways(key: &StopKey, times: &[NaiveDateTime], mode: HeadwayMode) -> HeadwaySeries {
    let window_starts: BTreeSet<NaiveDateTime> = match mode {
        HeadwayMode::Actual => BTreeSet::new(),
        HeadwayMode::Scheduled(windows) => windows.iter().map(|w| w.start).collect(),
    };

    let mut series = HeadwaySeries::default();
    let mut previous: Option<NaiveDateTime> = None;

    for &time in times {
        let predecessor = if window_starts.contains(&time) {
            None
        } else {
            previous
        };
        let duration: Option<TimeDelta> = predecessor.map(|p| time - p);

        if let Some(d) = duration.filter(|d| *d < TimeDelta::zero()) {
            warn!(stop = %key, %time, seconds = d.num_seconds(), "Negative headway");
            series.anomalies.push(Anomaly::NegativeHeadway {
                key: key.clone(),
                time,
                duration: d,
            });
        }

        series.headways.push(Headway {
            stop_id: key.stop_id.clone(),
            direction: key.direction.clone(),
            time,
            previous: predecessor,
            duration,
        });

        previous = Some(time);
    }

    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 1, 9)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn key() -> StopKey {
        StopKey::new("14122", "East")
    }

    #[test]
    fn test_first_headway_is_null() {
        let series = compute_headways(&key(), &[at(8, 0), at(8, 10), at(8, 25)], HeadwayMode::Actual);
        let h = &series.headways;

        assert_eq!(h.len(), 3);
        assert_eq!(h[0].previous, None);
        assert_eq!(h[0].duration, None);
        assert_eq!(h[1].minutes(), Some(10.0));
        assert_eq!(h[2].minutes(), Some(15.0));
        assert_eq!(h[2].previous, Some(at(8, 10)));
    }

    #[test]
    fn test_last_event_never_wraps_into_first() {
        let series = compute_headways(&key(), &[at(8, 0), at(23, 0)], HeadwayMode::Actual);
        assert_eq!(series.headways[0].previous, None);
    }

    #[test]
    fn test_empty_input() {
        let series = compute_headways(&key(), &[], HeadwayMode::Actual);
        assert!(series.headways.is_empty());
        assert!(series.anomalies.is_empty());
    }

    #[test]
    fn test_window_start_nulls_headway_in_scheduled_mode() {
        let windows = [
            ServiceWindow {
                start: at(6, 0),
                end: at(9, 0),
            },
            ServiceWindow {
                start: at(14, 0),
                end: at(18, 0),
            },
        ];
        let times = [at(6, 0), at(8, 0), at(9, 0), at(14, 0), at(14, 20)];

        let series = compute_headways(&key(), &times, HeadwayMode::Scheduled(&windows));
        let h = &series.headways;

        assert_eq!(h[2].minutes(), Some(60.0));
        assert_eq!(h[3].duration, None);
        assert_eq!(h[3].previous, None);
        assert_eq!(h[4].minutes(), Some(20.0));
    }

    #[test]
    fn test_window_start_kept_in_actual_mode() {
        let times = [at(9, 0), at(14, 0)];
        let series = compute_headways(&key(), &times, HeadwayMode::Actual);
        assert_eq!(series.headways[1].minutes(), Some(300.0));
    }

    #[test]
    fn test_out_of_order_flagged_negative() {
        let series = compute_headways(&key(), &[at(8, 10), at(8, 0)], HeadwayMode::Actual);

        assert!(series.headways[1].is_negative());
        assert_eq!(series.anomalies.len(), 1);
        assert!(matches!(
            &series.anomalies[0],
            Anomaly::NegativeHeadway { time, .. } if *time == at(8, 0)
        ));
    }

    #[test]
    fn test_simultaneous_events_zero_headway() {
        let series = compute_headways(&key(), &[at(8, 0), at(8, 0)], HeadwayMode::Actual);
        assert_eq!(series.headways[1].minutes(), Some(0.0));
        assert!(series.anomalies.is_empty());
    }
}
