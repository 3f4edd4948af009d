use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bus_headways::model::ScheduledStopVisit;
use bus_headways::services::ScheduleProvider;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::Deserialize;
use tracing::{debug, info};

/// One pre-resolved stop visit, as exported from a timetable feed.
#[derive(Deserialize)]
struct VisitRow {
    trip_id: String,
    service_id: String,
    route_id: String,
    direction: String,
    stop_id: String,
    /// `hh:mm:ss` from midnight of the service date; may exceed 24h.
    arrival_time: String,
    service_date: NaiveDate,
}

/// Serves scheduled visits from a flat CSV file of resolved stop times.
pub struct TimetableCsvProvider {
    path: PathBuf,
}

impl TimetableCsvProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ScheduleProvider for TimetableCsvProvider {
    async fn stop_visits(&self, route_id: &str, service_date: NaiveDate) -> Result<Vec<ScheduledStopVisit>> {
        let body = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("failed reading '{}'", self.path.display()))?;
        let visits = parse_visits(&body, route_id, service_date)?;

        info!(
            path = %self.path.display(),
            visits = visits.len(),
            "Loaded scheduled visits"
        );
        Ok(visits)
    }
}

/// Parses an `hh:mm:ss` offset from midnight that may run past 24:00.
pub fn parse_arrival_offset(raw: &str) -> Result<TimeDelta> {
    let parts: Vec<&str> = raw.trim().split(':').collect();
    let [h, m, s] = parts.as_slice() else {
        anyhow::bail!("expected hh:mm:ss arrival time, got '{raw}'");
    };
    let parse = |v: &str| -> Result<i64> {
        v.parse::<i64>()
            .with_context(|| format!("bad arrival time '{raw}'"))
    };
    Ok(TimeDelta::hours(parse(*h)?) + TimeDelta::minutes(parse(*m)?) + TimeDelta::seconds(parse(*s)?))
}

/// Visits of one route on one service date, with exact duplicates removed.
pub fn parse_visits(body: &[u8], route_id: &str, service_date: NaiveDate) -> Result<Vec<ScheduledStopVisit>> {
    let mut rdr = csv::Reader::from_reader(body);
    let mut seen = HashSet::new();
    let mut visits = Vec::new();
    let mut duplicates = 0usize;

    for (i, result) in rdr.deserialize().enumerate() {
        let row: VisitRow = result.with_context(|| format!("malformed timetable row {}", i + 1))?;
        if row.route_id != route_id || row.service_date != service_date {
            continue;
        }

        let midnight: NaiveDateTime = row.service_date.and_time(NaiveTime::MIN);
        let visit = ScheduledStopVisit {
            arrival: midnight + parse_arrival_offset(&row.arrival_time)?,
            trip_id: row.trip_id,
            service_id: row.service_id,
            route_id: row.route_id,
            stop_id: row.stop_id,
            direction: row.direction,
        };

        if seen.insert(visit.clone()) {
            visits.push(visit);
        } else {
            duplicates += 1;
        }
    }

    debug!(duplicates, "Dropped duplicate timetable rows");
    Ok(visits)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = b"trip_id,service_id,route_id,direction,stop_id,arrival_time,service_date
t1,65001,55,East,14122,08:00:00,2023-01-09
t1,65001,55,East,14122,08:00:00,2023-01-09
t2,65001,55,East,14122,25:10:00,2023-01-09
t3,65002,9,North,100,08:00:00,2023-01-09
t4,65001,55,East,14122,09:00:00,2023-01-10
";

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, 9).unwrap()
    }

    #[test]
    fn test_arrival_past_midnight() {
        assert_eq!(parse_arrival_offset("25:10:00").unwrap(), TimeDelta::minutes(25 * 60 + 10));
        assert!(parse_arrival_offset("8:00").is_err());
        assert!(parse_arrival_offset("aa:00:00").is_err());
    }

    #[test]
    fn test_filters_route_and_date_and_dedupes() {
        let visits = parse_visits(BODY, "55", date()).unwrap();

        assert_eq!(visits.len(), 2);
        assert_eq!(visits[0].trip_id, "t1");
        assert_eq!(
            visits[1].arrival,
            NaiveDate::from_ymd_opt(2023, 1, 10)
                .unwrap()
                .and_hms_opt(1, 10, 0)
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_provider_reads_file() {
        let path = std::env::temp_dir().join("bus_headways_test_timetable.csv");
        std::fs::write(&path, BODY).unwrap();

        let provider = TimetableCsvProvider::new(&path);
        let visits = provider.stop_visits("9", date()).await.unwrap();
        assert_eq!(visits.len(), 1);
        assert_eq!(visits[0].direction, "North");

        std::fs::remove_file(&path).unwrap();
    }
}
