//! Trait for the scheduled-trip provider.

use anyhow::Result;
use chrono::NaiveDate;

use crate::model::ScheduledStopVisit;

/// Abstraction over a timetable source (e.g., an extracted GTFS feed).
#[async_trait::async_trait]
pub trait ScheduleProvider: Send + Sync {
    /// Returns every scheduled stop visit of `route_id` on `service_date`.
    ///
    /// Arrivals past midnight belong to the service date they were scheduled
    /// under and carry a next-day timestamp.
    async fn stop_visits(&self, route_id: &str, service_date: NaiveDate)
    -> Result<Vec<ScheduledStopVisit>>;
}
