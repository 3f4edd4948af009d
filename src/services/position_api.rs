//! Trait for the position-sample provider, and the service-day sampling window.

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::HeadwayError;
use crate::model::PositionSample;

/// Offset from midnight of a service date, written `hh:mm`.
///
/// Hours may exceed 23 so a service day can run into the next calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ServiceOffset {
    minutes: u32,
}

impl ServiceOffset {
    pub fn hm(hours: u32, minutes: u32) -> Self {
        Self {
            minutes: hours * 60 + minutes,
        }
    }

    pub fn as_delta(&self) -> TimeDelta {
        TimeDelta::minutes(self.minutes as i64)
    }
}

impl FromStr for ServiceOffset {
    type Err = HeadwayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || HeadwayError::InvalidInput(format!("expected hh:mm offset, got '{s}'"));

        let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
        let hours: u32 = h.parse().map_err(|_| invalid())?;
        let minutes: u32 = m.parse().map_err(|_| invalid())?;
        if minutes >= 60 || hours >= 48 {
            return Err(invalid());
        }
        Ok(Self::hm(hours, minutes))
    }
}

impl fmt::Display for ServiceOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.minutes / 60, self.minutes % 60)
    }
}

impl Serialize for ServiceOffset {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ServiceOffset {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The stretch of time treated as one service day when sampling positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleWindow {
    pub service_date: NaiveDate,
    pub start: ServiceOffset,
    pub end: ServiceOffset,
}

impl SampleWindow {
    pub fn new(service_date: NaiveDate, start: ServiceOffset, end: ServiceOffset) -> Result<Self, HeadwayError> {
        if end <= start {
            return Err(HeadwayError::InvalidInput(format!(
                "sample window end {end} must be after start {start}"
            )));
        }
        Ok(Self {
            service_date,
            start,
            end,
        })
    }

    pub fn start_time(&self) -> NaiveDateTime {
        self.service_date.and_time(chrono::NaiveTime::MIN) + self.start.as_delta()
    }

    pub fn end_time(&self) -> NaiveDateTime {
        self.service_date.and_time(chrono::NaiveTime::MIN) + self.end.as_delta()
    }

    /// Start is exclusive, end inclusive.
    pub fn contains(&self, t: NaiveDateTime) -> bool {
        self.start_time() < t && t <= self.end_time()
    }

    /// Calendar days whose position data must be fetched and stitched.
    pub fn calendar_days(&self) -> Vec<NaiveDate> {
        self.start_time()
            .date()
            .iter_days()
            .take_while(|d| *d <= self.end_time().date())
            .collect()
    }
}

/// Abstraction over a vehicle position feed.
#[async_trait::async_trait]
pub trait PositionProvider: Send + Sync {
    /// Returns all samples inside `window`, across every route, stitched
    /// over the calendar-day boundary.
    async fn samples(&self, window: &SampleWindow) -> Result<Vec<PositionSample>>;
}
