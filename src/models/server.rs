// Upstream identity: configured base URL and its stable host[:port] key

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque server identity in `host[:port]` form; the aggregation key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(String);

impl ServerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identity of a status URL: its host, plus the port when one is spelled out.
    pub fn from_url(url: &Url) -> Self {
        let host = url.host_str().unwrap_or_default();
        match url.port() {
            Some(port) => Self(format!("{host}:{port}")),
            None => Self(host.to_string()),
        }
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A configured upstream: where to poll and what to call it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    pub id: ServerId,
    pub url: Url,
}

impl Upstream {
    /// Parse a configured base URL; only absolute http(s) URLs with a host are accepted.
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let url = Url::parse(raw.trim())?;
        anyhow::ensure!(
            matches!(url.scheme(), "http" | "https"),
            "unsupported scheme '{}' in upstream URL {}",
            url.scheme(),
            raw
        );
        anyhow::ensure!(url.has_host(), "upstream URL {} has no host", raw);
        Ok(Self {
            id: ServerId::from_url(&url),
            url,
        })
    }
}
