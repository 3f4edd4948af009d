//! Typed records shared by the actual and scheduled headway flows.
//!
//! Inputs (`PositionSample`, `ScheduledStopVisit`, `Pattern`) are never
//! mutated after construction; everything else is derived per query.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

pub type VehicleId = String;
pub type PatternId = u64;
pub type RouteId = String;
pub type StopId = String;

/// A single GPS report for a vehicle running a pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub vehicle_id: VehicleId,
    pub pattern_id: PatternId,
    pub route_id: RouteId,
    pub timestamp: NaiveDateTime,
    /// Distance along the pattern, in the pattern's own units (feet for CTA).
    pub distance: f64,
}

/// Movement of one vehicle between two time-adjacent samples on a pattern.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MotionInterval {
    pub vehicle_id: VehicleId,
    pub pattern_id: PatternId,
    pub start_time: NaiveDateTime,
    pub start_distance: f64,
    pub end_time: NaiveDateTime,
    pub end_distance: f64,
}

impl MotionInterval {
    /// The vehicle did not move along the pattern, so no distance ratio exists.
    pub fn is_degenerate(&self) -> bool {
        self.end_distance == self.start_distance
    }

    pub fn duration(&self) -> TimeDelta {
        self.end_time - self.start_time
    }

    /// Whether a stop at `stop_distance` is reached during this interval.
    pub fn straddles(&self, stop_distance: f64) -> bool {
        self.start_distance < stop_distance && stop_distance <= self.end_distance
    }
}

/// Lookup key for everything computed per logical stop.
///
/// A physical stop served by several pattern variants collapses to one key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StopKey {
    pub stop_id: StopId,
    pub direction: String,
}

impl StopKey {
    pub fn new(stop_id: impl Into<StopId>, direction: impl Into<String>) -> Self {
        Self {
            stop_id: stop_id.into(),
            direction: direction.into(),
        }
    }
}

impl std::fmt::Display for StopKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.stop_id, self.direction)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopLocation {
    pub stop_id: StopId,
    pub pattern_id: PatternId,
    pub direction: String,
    pub distance: f64,
}

impl StopLocation {
    pub fn key(&self) -> StopKey {
        StopKey::new(self.stop_id.clone(), self.direction.clone())
    }
}

/// Estimated instant a vehicle passed a stop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossingEvent {
    pub stop_id: StopId,
    pub direction: String,
    pub vehicle_id: VehicleId,
    pub pattern_id: PatternId,
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScheduledStopVisit {
    pub trip_id: String,
    pub service_id: String,
    pub route_id: RouteId,
    pub stop_id: StopId,
    pub direction: String,
    pub arrival: NaiveDateTime,
}

impl ScheduledStopVisit {
    pub fn key(&self) -> StopKey {
        StopKey::new(self.stop_id.clone(), self.direction.clone())
    }
}

/// Continuous scheduled coverage at a stop+direction, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServiceWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl ServiceWindow {
    pub fn contains(&self, t: NaiveDateTime) -> bool {
        self.start <= t && t <= self.end
    }
}

/// Time since the previous vehicle at the same stop+direction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Headway {
    pub stop_id: StopId,
    pub direction: String,
    pub time: NaiveDateTime,
    pub previous: Option<NaiveDateTime>,
    pub duration: Option<TimeDelta>,
}

impl Headway {
    pub fn minutes(&self) -> Option<f64> {
        self.duration.map(|d| d.num_seconds() as f64 / 60.0)
    }

    pub fn is_negative(&self) -> bool {
        self.duration.is_some_and(|d| d < TimeDelta::zero())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointKind {
    #[serde(rename = "S")]
    Stop,
    #[serde(rename = "W")]
    Waypoint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternPoint {
    pub seq: u32,
    pub kind: PointKind,
    pub stop_id: Option<StopId>,
    pub distance: f64,
}

/// One routing variant of a route, as returned by the topology provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub pattern_id: PatternId,
    pub direction: String,
    pub points: Vec<PatternPoint>,
}

impl Pattern {
    /// Stops on this pattern in sequence order.
    pub fn stops(&self) -> Vec<StopLocation> {
        let mut points: Vec<&PatternPoint> = self
            .points
            .iter()
            .filter(|p| p.kind == PointKind::Stop)
            .collect();
        points.sort_by_key(|p| p.seq);

        points
            .into_iter()
            .filter_map(|p| {
                Some(StopLocation {
                    stop_id: p.stop_id.clone()?,
                    pattern_id: self.pattern_id,
                    direction: self.direction.clone(),
                    distance: p.distance,
                })
            })
            .collect()
    }
}

/// Identifies the query a report was produced for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteDay {
    pub route_id: RouteId,
    pub service_date: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 1, 9)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn interval(start_distance: f64, end_distance: f64) -> MotionInterval {
        MotionInterval {
            vehicle_id: "1".into(),
            pattern_id: 1,
            start_time: at(8, 0, 0),
            start_distance,
            end_time: at(8, 5, 0),
            end_distance,
        }
    }

    #[test]
    fn test_straddles_is_half_open() {
        let i = interval(100.0, 200.0);
        assert!(!i.straddles(100.0));
        assert!(i.straddles(150.0));
        assert!(i.straddles(200.0));
        assert!(!i.straddles(201.0));
    }

    #[test]
    fn test_degenerate_interval() {
        assert!(interval(50.0, 50.0).is_degenerate());
        assert!(!interval(50.0, 51.0).is_degenerate());
    }

    #[test]
    fn test_headway_minutes_and_sign() {
        let h = Headway {
            stop_id: "1".into(),
            direction: "East".into(),
            time: at(8, 10, 0),
            previous: Some(at(8, 0, 0)),
            duration: Some(TimeDelta::minutes(10)),
        };
        assert_eq!(h.minutes(), Some(10.0));
        assert!(!h.is_negative());

        let negative = Headway {
            duration: Some(TimeDelta::minutes(-2)),
            ..h
        };
        assert!(negative.is_negative());
    }

    #[test]
    fn test_pattern_stops_in_sequence_order() {
        let pattern = Pattern {
            pattern_id: 5420,
            direction: "Eastbound".into(),
            points: vec![
                PatternPoint {
                    seq: 3,
                    kind: PointKind::Stop,
                    stop_id: Some("B".into()),
                    distance: 900.0,
                },
                PatternPoint {
                    seq: 2,
                    kind: PointKind::Waypoint,
                    stop_id: None,
                    distance: 400.0,
                },
                PatternPoint {
                    seq: 1,
                    kind: PointKind::Stop,
                    stop_id: Some("A".into()),
                    distance: 0.0,
                },
            ],
        };

        let stops = pattern.stops();
        assert_eq!(stops.len(), 2);
        assert_eq!(stops[0].stop_id, "A");
        assert_eq!(stops[1].stop_id, "B");
        assert_eq!(stops[1].direction, "Eastbound");
        assert_eq!(stops[1].key(), StopKey::new("B", "Eastbound"));
    }
}
