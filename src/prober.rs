// Upstream prober: one bounded HTTP GET per upstream, normalized into a StatusRecord.
// Failures are data (offline), never errors for the caller.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};

use crate::models::{StatusRecord, Upstream, payload};

/// Why an upstream was classified offline.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected HTTP status {0}")]
    Status(StatusCode),
}

#[derive(Debug, Clone)]
pub struct Prober {
    client: Client,
}

impl Prober {
    /// Build a prober whose requests (connect + body) are bounded by `timeout`.
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Poll one upstream. Always yields exactly one record.
    #[instrument(skip(self, upstream), fields(server = %upstream.id, operation = "probe"))]
    pub async fn probe(&self, upstream: &Upstream) -> StatusRecord {
        let body = match self.fetch(upstream).await {
            Ok(body) => body,
            Err(e) => {
                debug!(error = %e, "upstream offline");
                return StatusRecord::offline(upstream.id.clone());
            }
        };
        let attrs = payload::parse_payload(&body).unwrap_or_else(|e| {
            debug!(error = %e, "malformed upstream payload; reporting online without attributes");
            Default::default()
        });
        StatusRecord::online(upstream.id.clone(), attrs)
    }

    async fn fetch(&self, upstream: &Upstream) -> Result<bytes::Bytes, ProbeError> {
        debug!(url = %upstream.url, "polling upstream");
        let res = self.client.get(upstream.url.clone()).send().await?;
        if !res.status().is_success() {
            return Err(ProbeError::Status(res.status()));
        }
        Ok(res.bytes().await?)
    }
}
