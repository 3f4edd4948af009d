//! Turns position samples into motion intervals, one vehicle and pattern at a time.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::error::Anomaly;
use crate::model::{MotionInterval, PatternId, PositionSample, VehicleId};

/// Motion intervals for one route, indexed by pattern.
#[derive(Debug, Default)]
pub struct IntervalSet {
    by_pattern: HashMap<PatternId, Vec<MotionInterval>>,
    pub anomalies: Vec<Anomaly>,
}

impl IntervalSet {
    pub fn on_pattern(&self, pattern_id: PatternId) -> &[MotionInterval] {
        self.by_pattern
            .get(&pattern_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.by_pattern.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Pairs each sample with its predecessor in time, per (vehicle, pattern).
///
/// Samples for other routes are ignored. A group with a single sample
/// produces no intervals. Degenerate intervals are kept but flagged; pairs
/// sharing a timestamp are dropped and reported.
pub fn build_intervals(samples: &[PositionSample], route_id: &str) -> IntervalSet {
    let mut groups: BTreeMap<(&VehicleId, PatternId), Vec<&PositionSample>> = BTreeMap::new();
    for sample in samples.iter().filter(|s| s.route_id == route_id) {
        groups
            .entry((&sample.vehicle_id, sample.pattern_id))
            .or_default()
            .push(sample);
    }

    let mut set = IntervalSet::default();

    for ((vehicle_id, pattern_id), mut group) in groups {
        group.sort_by_key(|s| s.timestamp);

        for pair in group.windows(2) {
            let (start, end) = (pair[0], pair[1]);

            if end.timestamp <= start.timestamp {
                set.anomalies.push(Anomaly::NonIncreasingTime {
                    vehicle_id: vehicle_id.clone(),
                    pattern_id,
                    at: end.timestamp,
                });
                continue;
            }

            let interval = MotionInterval {
                vehicle_id: vehicle_id.clone(),
                pattern_id,
                start_time: start.timestamp,
                start_distance: start.distance,
                end_time: end.timestamp,
                end_distance: end.distance,
            };

            if interval.is_degenerate() {
                set.anomalies.push(Anomaly::DegenerateInterval {
                    vehicle_id: vehicle_id.clone(),
                    pattern_id,
                    at: interval.start_time,
                });
            }

            set.by_pattern.entry(pattern_id).or_default().push(interval);
        }
    }

    debug!(
        route_id,
        samples = samples.len(),
        intervals = set.len(),
        anomalies = set.anomalies.len(),
        "Built motion intervals"
    );

    set
}
