use anyhow::{Context, Result};
use async_trait::async_trait;
use bus_headways::fetch::{BasicClient, HttpClient, fetch_bytes};
use bus_headways::model::{PatternId, PositionSample};
use bus_headways::services::{PositionProvider, SampleWindow};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use tracing::{debug, info};

/// Timestamp layouts seen in the scraped vehicle files.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y%m%d %H:%M:%S",
    "%Y%m%d %H:%M",
];

/// One row of a full-day vehicle file. Unused columns are ignored.
#[derive(Deserialize)]
struct RawVehicle {
    vid: String,
    tmstmp: String,
    pid: PatternId,
    rt: String,
    pdist: f64,
}

/// Reads the daily vehicle-position CSVs scraped by the ghost bus project.
pub struct GhostBusClient<C = BasicClient> {
    base_url: String,
    http: C,
}

impl GhostBusClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self::with_client(base_url, BasicClient::new()?))
    }
}

impl<C> GhostBusClient<C> {
    pub fn with_client(base_url: &str, http: C) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }

    fn day_url(&self, day: NaiveDate) -> String {
        format!("{}/{}.csv", self.base_url, day.format("%Y-%m-%d"))
    }
}

#[async_trait]
impl<C: HttpClient> PositionProvider for GhostBusClient<C> {
    async fn samples(&self, window: &SampleWindow) -> Result<Vec<PositionSample>> {
        let mut samples = Vec::new();

        for day in window.calendar_days() {
            let url = self.day_url(day);
            let body = fetch_bytes(&self.http, &url)
                .await
                .with_context(|| format!("vehicle file for {day} unavailable"))?;
            let day_samples = parse_samples(&body)?;
            debug!(%day, rows = day_samples.len(), "Parsed vehicle file");
            samples.extend(day_samples.into_iter().filter(|s| window.contains(s.timestamp)));
        }

        info!(
            samples = samples.len(),
            start = %window.start_time(),
            end = %window.end_time(),
            "Loaded position samples"
        );
        Ok(samples)
    }
}

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .with_context(|| format!("unrecognized timestamp '{raw}'"))
}

/// Decodes a vehicle CSV. Any malformed row fails the whole file.
pub fn parse_samples(body: &[u8]) -> Result<Vec<PositionSample>> {
    let mut rdr = csv::Reader::from_reader(body);
    let mut samples = Vec::new();

    for (i, result) in rdr.deserialize().enumerate() {
        let raw: RawVehicle = result.with_context(|| format!("malformed vehicle row {}", i + 1))?;
        samples.push(PositionSample {
            vehicle_id: raw.vid,
            pattern_id: raw.pid,
            route_id: raw.rt,
            timestamp: parse_timestamp(&raw.tmstmp)?,
            distance: raw.pdist,
        });
    }

    Ok(samples)
}
