//! Reachability probe for the brAIn web interface.
//!
//! A probe answers one question: did the endpoint return HTTP 200 just now?
//! Connection refused, timeouts and non-200 statuses are all "not ready";
//! the caller does not distinguish between them.

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// Outcome of a single probe attempt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProbeResult {
    Ready,
    NotReady { reason: String },
}

impl ProbeResult {
    pub fn is_ready(&self) -> bool {
        matches!(self, ProbeResult::Ready)
    }
}

impl fmt::Display for ProbeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeResult::Ready => write!(f, "ready"),
            ProbeResult::NotReady { reason } => write!(f, "not ready ({})", reason),
        }
    }
}

#[async_trait]
pub trait Probe: Send + Sync {
    /// The URL being probed, for messages.
    fn endpoint(&self) -> &str;

    async fn check(&self) -> ProbeResult;
}

/// `GET <endpoint>` over reqwest; only status 200 counts as ready.
pub struct HttpProbe {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(endpoint: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }
}

#[async_trait]
impl Probe for HttpProbe {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn check(&self) -> ProbeResult {
        match self.client.get(&self.endpoint).send().await {
            Ok(response) if response.status() == reqwest::StatusCode::OK => ProbeResult::Ready,
            Ok(response) => ProbeResult::NotReady {
                reason: format!("HTTP {}", response.status()),
            },
            Err(e) => ProbeResult::NotReady {
                reason: e.to_string(),
            },
        }
    }
}
