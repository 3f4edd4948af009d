use anyhow::{Context, Result};
use async_trait::async_trait;
use bus_headways::fetch::auth::UrlParam;
use bus_headways::fetch::{BasicClient, HttpClient, fetch_bytes};
use bus_headways::model::{Pattern, PatternId, PatternPoint, PointKind};
use bus_headways::services::PatternProvider;
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "bustime-response")]
    response: BustimeResponse,
}

#[derive(Deserialize)]
struct BustimeResponse {
    #[serde(default)]
    ptr: Vec<RawPattern>,
    #[serde(default)]
    error: Vec<ApiError>,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    pid: Option<serde_json::Value>,
    msg: String,
}

#[derive(Deserialize)]
struct RawPattern {
    pid: PatternId,
    rtdir: String,
    pt: Vec<RawPoint>,
}

#[derive(Deserialize)]
struct RawPoint {
    seq: u32,
    typ: String,
    #[serde(default)]
    stpid: Option<String>,
    pdist: f64,
}

/// Client for the bus tracker `getpatterns` endpoint.
///
/// The API key is supplied at construction and attached to every request.
pub struct BusTrackerClient<C = UrlParam<BasicClient>> {
    base_url: String,
    http: C,
    max_batch: usize,
}

impl BusTrackerClient {
    pub fn new(base_url: &str, api_key: &str, max_batch: usize) -> Result<Self> {
        if api_key.is_empty() {
            anyhow::bail!("bus tracker API key is empty; set BUSTRACKER_API_KEY");
        }
        let http = UrlParam::new(BasicClient::new()?, "key", api_key);
        Ok(Self::with_client(base_url, http, max_batch))
    }
}

impl<C> BusTrackerClient<C> {
    pub fn with_client(base_url: &str, http: C, max_batch: usize) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            max_batch,
        }
    }

    fn patterns_url(&self, pattern_ids: &[PatternId]) -> String {
        let pids: Vec<String> = pattern_ids.iter().map(|p| p.to_string()).collect();
        format!(
            "{}/getpatterns?pid={}&format=json",
            self.base_url,
            pids.join(",")
        )
    }
}

#[async_trait]
impl<C: HttpClient> PatternProvider for BusTrackerClient<C> {
    fn max_batch(&self) -> usize {
        self.max_batch
    }

    async fn pattern_batch(&self, pattern_ids: &[PatternId]) -> Result<Vec<Pattern>> {
        let url = self.patterns_url(pattern_ids);
        let body = fetch_bytes(&self.http, &url)
            .await
            .context("getpatterns request failed")?;
        parse_patterns(&body)
    }
}

/// Decodes a `getpatterns` response.
///
/// Per-pattern errors alongside returned patterns are logged and skipped;
/// a response with errors only, or one that does not parse, is an error.
pub fn parse_patterns(body: &[u8]) -> Result<Vec<Pattern>> {
    let envelope: Envelope =
        serde_json::from_slice(body).context("malformed getpatterns response")?;
    let response = envelope.response;

    if response.ptr.is_empty() && !response.error.is_empty() {
        let messages: Vec<&str> = response.error.iter().map(|e| e.msg.as_str()).collect();
        anyhow::bail!("getpatterns returned errors: {}", messages.join("; "));
    }
    for err in &response.error {
        warn!(pid = ?err.pid, msg = %err.msg, "Pattern not returned");
    }

    let patterns: Vec<Pattern> = response
        .ptr
        .into_iter()
        .map(|raw| Pattern {
            pattern_id: raw.pid,
            direction: raw.rtdir,
            points: raw
                .pt
                .into_iter()
                .map(|p| PatternPoint {
                    seq: p.seq,
                    kind: if p.typ == "S" {
                        PointKind::Stop
                    } else {
                        PointKind::Waypoint
                    },
                    stop_id: p.stpid,
                    distance: p.pdist,
                })
                .collect(),
        })
        .collect();

    debug!(patterns = patterns.len(), "Parsed pattern topology");
    Ok(patterns)
}
