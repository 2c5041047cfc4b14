use std::time::Duration;

/// One unit of work. Each ticket is handed to exactly one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(pub usize);

/// How a single request attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed { code: u16, status: String },
    TimedOut,
    Errored,
}

/// Timing breakdown and outcome of one request attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatencySample {
    pub connection: Duration, // DNS lookup + TCP connect
    pub server: Duration, // TLS handshake + server processing
    pub outcome: Outcome,
}

impl LatencySample {
    pub fn completed(connection: Duration, server: Duration, code: u16, status: String) -> Self {
        Self {
            connection,
            server,
            outcome: Outcome::Completed { code, status },
        }
    }

    pub fn timed_out() -> Self {
        Self::failed(Outcome::TimedOut)
    }

    pub fn errored() -> Self {
        Self::failed(Outcome::Errored)
    }

    fn failed(outcome: Outcome) -> Self {
        Self {
            connection: Duration::ZERO,
            server: Duration::ZERO,
            outcome,
        }
    }

    pub fn total(&self) -> Duration {
        self.connection + self.server
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self.outcome, Outcome::TimedOut)
    }

    pub fn is_errored(&self) -> bool {
        matches!(self.outcome, Outcome::Errored)
    }

    /// Status line text such as "200 OK", absent for failed attempts.
    pub fn status(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Completed { status, .. } => Some(status),
            _ => None,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match &self.outcome {
            Outcome::Completed { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_is_sum_of_phases() {
        let sample = LatencySample::completed(
            Duration::from_millis(3),
            Duration::from_millis(7),
            200,
            "200 OK".to_string()
        );
        assert_eq!(sample.total(), Duration::from_millis(10));
        assert_eq!(sample.status(), Some("200 OK"));
        assert_eq!(sample.status_code(), Some(200));
    }

    #[test]
    fn failed_samples_have_no_status() {
        let timeout = LatencySample::timed_out();
        let error = LatencySample::errored();

        assert!(timeout.is_timed_out() && !timeout.is_errored());
        assert!(error.is_errored() && !error.is_timed_out());
        assert_eq!(timeout.status(), None);
        assert_eq!(error.status_code(), None);
        assert_eq!(error.total(), Duration::ZERO);
    }
}
