// ABOUTME: HTTP/1.1 readiness probe built on hyper over a tokio TcpStream.
// ABOUTME: Each attempt is cut off when the overall deadline passes.

use super::report::{AttemptOutcome, ProbeAttempt, ProbeReport, Verdict};
use super::{Endpoint, Probe};
use async_trait::async_trait;
use http_body_util::Empty;
use hyper_util::rt::TokioIo;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;

#[derive(Debug, Clone, Default)]
pub struct HttpProbe;

impl HttpProbe {
    pub fn new() -> Self {
        Self
    }

    async fn attempt(endpoint: &Endpoint) -> AttemptOutcome {
        match Self::request(endpoint).await {
            Ok(status) => AttemptOutcome::Status(status),
            Err(e) => AttemptOutcome::Error(e),
        }
    }

    async fn request(endpoint: &Endpoint) -> Result<u16, String> {
        let stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port))
            .await
            .map_err(|e| format!("connect: {}", e))?;

        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .map_err(|e| format!("handshake: {}", e))?;
        let conn = tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::trace!("probe connection closed: {}", e);
            }
        });

        let req = hyper::Request::builder()
            .method("GET")
            .uri(endpoint.path.as_str())
            .header("Host", format!("{}:{}", endpoint.host, endpoint.port))
            .header("User-Agent", concat!("hoist/", env!("CARGO_PKG_VERSION")))
            .body(Empty::<bytes::Bytes>::new())
            .map_err(|e| format!("request: {}", e))?;

        let result = sender
            .send_request(req)
            .await
            .map(|resp| resp.status().as_u16())
            .map_err(|e| format!("request: {}", e));
        conn.abort();
        result
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn check(
        &self,
        endpoint: &Endpoint,
        timeout: Duration,
        poll_interval: Duration,
    ) -> ProbeReport {
        let started = Instant::now();
        let deadline = started + timeout;
        let mut attempts = Vec::new();

        for seq in 1.. {
            let now = Instant::now();
            if now >= deadline {
                break;
            }

            let outcome = match tokio::time::timeout_at(deadline, Self::attempt(endpoint)).await {
                Ok(outcome) => outcome,
                Err(_) => AttemptOutcome::Error("no response before deadline".to_string()),
            };
            tracing::debug!(%endpoint, seq, outcome = %outcome, "probe attempt");

            let healthy = outcome.is_success();
            attempts.push(ProbeAttempt {
                seq,
                offset: now - started,
                outcome,
            });
            if healthy {
                return ProbeReport {
                    verdict: Verdict::Healthy,
                    attempts,
                    elapsed: started.elapsed(),
                };
            }

            tokio::time::sleep_until((now + poll_interval).min(deadline)).await;
        }

        let report = ProbeReport::give_up(attempts, started.elapsed());
        tracing::warn!(%endpoint, verdict = %report.verdict, attempts = report.attempts.len(), "probe gave up");
        report
    }
}
