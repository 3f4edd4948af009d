//! HTTP access for the upstream feeds, behind a small client trait so
//! credentials can be layered on as wrappers.

mod basic;
pub mod auth;

pub use basic::BasicClient;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Request, Response};
use tracing::debug;

/// Executes a prepared request. Wrappers decorate the request and delegate.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}

/// GETs `url` and returns the body, failing on any non-success status.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Bytes> {
    let req = Request::new(
        reqwest::Method::GET,
        url.parse().with_context(|| format!("invalid url '{url}'"))?,
    );

    let resp = client.execute(req).await?.error_for_status()?;
    let body = resp.bytes().await?;
    debug!(bytes = body.len(), "Fetched response body");
    Ok(body)
}
