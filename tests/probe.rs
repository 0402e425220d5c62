// ABOUTME: Integration tests for the HTTP readiness probe against local listeners.
// ABOUTME: Healthy on 2xx, Unhealthy on other answers, Timeout when nothing answers.

mod support;

use hoist::probe::{AttemptOutcome, Endpoint, HttpProbe, Probe, Verdict};
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_millis(600);
const INTERVAL: Duration = Duration::from_millis(100);

#[tokio::test]
async fn responsive_endpoint_is_healthy_on_first_attempt() {
    support::init_tracing();
    let port = support::serve_status(200).await;
    let report = HttpProbe::new()
        .check(&Endpoint::new("127.0.0.1", port, "/"), TIMEOUT, INTERVAL)
        .await;

    assert_eq!(report.verdict, Verdict::Healthy);
    assert_eq!(report.attempts.len(), 1);
    assert_eq!(report.attempts[0].outcome, AttemptOutcome::Status(200));
}

#[tokio::test]
async fn silent_endpoint_times_out_within_one_interval() {
    let port = support::serve_silence().await;
    let report = HttpProbe::new()
        .check(&Endpoint::new("127.0.0.1", port, "/healthz"), TIMEOUT, INTERVAL)
        .await;

    assert_eq!(report.verdict, Verdict::Timeout);
    assert!(report.elapsed + INTERVAL >= TIMEOUT, "{:?}", report.elapsed);
    assert!(report.elapsed <= TIMEOUT + INTERVAL, "{:?}", report.elapsed);
}

#[tokio::test]
async fn refused_connections_time_out_with_every_attempt_recorded() {
    // Bind then drop to find a port nothing listens on.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let report = HttpProbe::new()
        .check(&Endpoint::new("127.0.0.1", port, "/"), TIMEOUT, INTERVAL)
        .await;

    assert_eq!(report.verdict, Verdict::Timeout);
    assert!(report.attempts.len() >= 3, "{} attempts", report.attempts.len());
    let seqs: Vec<u32> = report.attempts.iter().map(|a| a.seq).collect();
    assert_eq!(seqs, (1..=seqs.len() as u32).collect::<Vec<_>>());
    assert!(report.attempts.windows(2).all(|w| w[0].offset <= w[1].offset));
}

#[tokio::test]
async fn error_status_is_unhealthy() {
    let port = support::serve_status(503).await;
    let report = HttpProbe::new()
        .check(&Endpoint::new("127.0.0.1", port, "/"), TIMEOUT, INTERVAL)
        .await;

    assert_eq!(report.verdict, Verdict::Unhealthy);
    assert!(
        report
            .attempts
            .iter()
            .all(|a| a.outcome == AttemptOutcome::Status(503))
    );
    assert!(report.lines().iter().any(|line| line.contains("503")));
}
