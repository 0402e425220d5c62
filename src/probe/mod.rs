// ABOUTME: Verification probe: poll an HTTP endpoint until healthy or out of time.
// ABOUTME: Reports every attempt alongside the verdict; one success is enough.

mod http;
mod report;

pub use http::HttpProbe;
pub use report::{AttemptOutcome, ProbeAttempt, ProbeReport, Verdict};

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Where to send the readiness request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        let path = path.into();
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };
        Self {
            host: host.into(),
            port,
            path,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "http://{}:{}{}", self.host, self.port, self.path)
    }
}

#[async_trait]
pub trait Probe: Send + Sync {
    /// Poll every `poll_interval` until a 2xx arrives or `timeout` elapses.
    async fn check(&self, endpoint: &Endpoint, timeout: Duration, poll_interval: Duration)
    -> ProbeReport;
}

/// Answers healthy without touching the network; stands in during dry runs.
pub struct SimulatedProbe;

#[async_trait]
impl Probe for SimulatedProbe {
    async fn check(&self, endpoint: &Endpoint, _: Duration, _: Duration) -> ProbeReport {
        tracing::info!(%endpoint, "simulated probe");
        ProbeReport {
            verdict: Verdict::Healthy,
            attempts: vec![ProbeAttempt {
                seq: 1,
                offset: Duration::ZERO,
                outcome: AttemptOutcome::Status(200),
            }],
            elapsed: Duration::ZERO,
        }
    }
}
