//! Errors that abort a query, and anomalies that only exclude a record.

use chrono::{NaiveDateTime, TimeDelta};
use serde::Serialize;

use crate::model::{PatternId, StopKey, VehicleId};

#[derive(thiserror::Error, Debug)]
pub enum HeadwayError {
    #[error("no {what} found for {key}")]
    MissingData { what: &'static str, key: String },
    #[error("interval for vehicle {vehicle_id} on pattern {pattern_id} has zero distance delta")]
    DegenerateInterval {
        vehicle_id: VehicleId,
        pattern_id: PatternId,
    },
    #[error("{provider} unavailable: {reason}")]
    UpstreamUnavailable {
        provider: &'static str,
        reason: String,
    },
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl HeadwayError {
    /// Keeps the full context chain of the provider error in the message.
    pub fn upstream(provider: &'static str, source: anyhow::Error) -> Self {
        Self::UpstreamUnavailable {
            provider,
            reason: format!("{source:#}"),
        }
    }
}

/// A recoverable data problem. The offending record is excluded and the
/// computation continues.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    DegenerateInterval {
        vehicle_id: VehicleId,
        pattern_id: PatternId,
        at: NaiveDateTime,
    },
    /// Two samples for the same vehicle and pattern share a timestamp.
    NonIncreasingTime {
        vehicle_id: VehicleId,
        pattern_id: PatternId,
        at: NaiveDateTime,
    },
    NegativeHeadway {
        key: StopKey,
        time: NaiveDateTime,
        #[serde(serialize_with = "serialize_seconds")]
        duration: TimeDelta,
    },
}

impl Anomaly {
    pub fn kind(&self) -> &'static str {
        match self {
            Anomaly::DegenerateInterval { .. } => "degenerate_interval",
            Anomaly::NonIncreasingTime { .. } => "non_increasing_time",
            Anomaly::NegativeHeadway { .. } => "negative_headway",
        }
    }
}

fn serialize_seconds<S: serde::Serializer>(d: &TimeDelta, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_i64(d.num_seconds())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_data_message() {
        let err = HeadwayError::MissingData {
            what: "scheduled visits",
            key: "route 55 on 2023-01-09".into(),
        };
        assert_eq!(
            err.to_string(),
            "no scheduled visits found for route 55 on 2023-01-09"
        );
    }

    #[test]
    fn test_upstream_wraps_source() {
        let err = HeadwayError::upstream("pattern api", anyhow::anyhow!("status 503"));
        assert_eq!(err.to_string(), "pattern api unavailable: status 503");
    }
}
