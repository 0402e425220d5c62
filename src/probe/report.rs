// ABOUTME: Probe verdicts and the per-attempt record kept for diagnostics.
// ABOUTME: Timeout means nothing ever answered; Unhealthy means something answered wrongly.

use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Healthy,
    Unhealthy,
    Timeout,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verdict::Healthy => "healthy",
            Verdict::Unhealthy => "unhealthy",
            Verdict::Timeout => "timeout",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptOutcome {
    /// An HTTP response arrived with this status.
    Status(u16),
    /// No response: refused, reset, or timed out.
    Error(String),
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Status(s) if (200..300).contains(s))
    }

    pub fn got_response(&self) -> bool {
        matches!(self, AttemptOutcome::Status(_))
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptOutcome::Status(s) => write!(f, "HTTP {}", s),
            AttemptOutcome::Error(e) => f.write_str(e),
        }
    }
}

fn millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeAttempt {
    pub seq: u32,
    /// Time since the probe started.
    #[serde(rename = "offset_ms", serialize_with = "millis")]
    pub offset: Duration,
    pub outcome: AttemptOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub verdict: Verdict,
    pub attempts: Vec<ProbeAttempt>,
    #[serde(rename = "elapsed_ms", serialize_with = "millis")]
    pub elapsed: Duration,
}

impl ProbeReport {
    /// Verdict for a probe that ran out of time with these attempts.
    pub fn give_up(attempts: Vec<ProbeAttempt>, elapsed: Duration) -> Self {
        let verdict = if attempts.iter().any(|a| a.outcome.got_response()) {
            Verdict::Unhealthy
        } else {
            Verdict::Timeout
        };
        Self {
            verdict,
            attempts,
            elapsed,
        }
    }

    /// One line per attempt, e.g. `#3 +2.0s HTTP 503`.
    pub fn lines(&self) -> Vec<String> {
        self.attempts
            .iter()
            .map(|a| format!("#{} +{:.1}s {}", a.seq, a.offset.as_secs_f64(), a.outcome))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(seq: u32, outcome: AttemptOutcome) -> ProbeAttempt {
        ProbeAttempt {
            seq,
            offset: Duration::from_secs(seq as u64),
            outcome,
        }
    }

    #[test]
    fn any_response_makes_it_unhealthy() {
        let report = ProbeReport::give_up(
            vec![
                attempt(1, AttemptOutcome::Error("connection refused".into())),
                attempt(2, AttemptOutcome::Status(503)),
            ],
            Duration::from_secs(3),
        );
        assert_eq!(report.verdict, Verdict::Unhealthy);
    }

    #[test]
    fn silence_is_a_timeout() {
        let report = ProbeReport::give_up(
            vec![attempt(1, AttemptOutcome::Error("timed out".into()))],
            Duration::from_secs(10),
        );
        assert_eq!(report.verdict, Verdict::Timeout);
        assert_eq!(report.lines(), vec!["#1 +1.0s timed out"]);
    }
}
