use crate::sample::{ LatencySample, Outcome };

use std::time::Duration;
use regex::Regex;
use tokio::{ sync::mpsc, time::Instant };
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const BUCKET_COUNT: usize = 10; // size of the histogram

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Percentiles {
    pub p50: Duration,
    pub p75: Duration,
    pub p90: Duration,
    pub p95: Duration,
    pub p99: Duration,
}

/// Summary of one timing dimension over the completed requests.
/// All zero when there were none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LatencyDistribution {
    pub minimum: Duration,
    pub maximum: Duration,
    pub mean: Duration,
    pub percentiles: Percentiles,
}

impl LatencyDistribution {
    /// `latencies` must be sorted ascending.
    pub fn from_sorted(latencies: &[Duration]) -> Self {
        let (Some(&minimum), Some(&maximum)) = (latencies.first(), latencies.last()) else {
            return Self::default();
        };
        let sum: u128 = latencies.iter().map(Duration::as_nanos).sum();
        let mean = Duration::from_nanos((sum / latencies.len() as u128) as u64);

        Self {
            minimum,
            maximum,
            mean,
            percentiles: Percentiles {
                p50: percentile(50, latencies),
                p75: percentile(75, latencies),
                p90: percentile(90, latencies),
                p95: percentile(95, latencies),
                p99: percentile(99, latencies),
            },
        }
    }

    pub fn from_unsorted(mut latencies: Vec<Duration>) -> Self {
        latencies.sort_unstable();
        Self::from_sorted(&latencies)
    }
}

/// Percentile `p` of sorted `latencies`, interpolating linearly between the
/// neighbouring order statistics when the rank is fractional.
pub fn percentile(p: u32, latencies: &[Duration]) -> Duration {
    let n = latencies.len();
    if n == 0 {
        return Duration::ZERO;
    }

    // 1-based rank
    let rank = (p as f64) * ((n - 1) as f64) / 100.0 + 1.0;
    let whole = rank.floor();
    let base = latencies[(whole as usize) - 1];
    let weight = rank - whole;
    if weight == 0.0 {
        return base;
    }
    let next = latencies[(whole as usize).min(n - 1)];
    base + (next - base).mul_f64(weight)
}

/// Fixed-width buckets over `0..=max(total latency)` of the completed requests.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Histogram {
    pub bucket_size: Duration,
    pub counts: Vec<usize>,
}

impl Histogram {
    pub fn from_sorted(latencies: &[Duration]) -> Self {
        let Some(&max) = latencies.last() else {
            return Self::default();
        };
        let bucket_size = max / (BUCKET_COUNT as u32);
        let mut counts = vec![0; BUCKET_COUNT];
        for latency in latencies {
            let bucket = if bucket_size.is_zero() {
                0
            } else {
                ((latency.as_nanos() / bucket_size.as_nanos()) as usize).min(BUCKET_COUNT - 1)
            };
            counts[bucket] += 1;
        }
        Self { bucket_size, counts }
    }
}

/// Final result of a run. Built once, never modified.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunSummary {
    pub connection: LatencyDistribution, // time to connect to the server
    pub server: LatencyDistribution, // time to receive the response once connected
    pub total: LatencyDistribution,
    pub histogram: Histogram, // total latency
    pub elapsed: Duration,
    pub total_requests: usize,
    pub total_errors: usize,
    pub total_timeouts: usize,
    pub total_matches: usize,
    pub total_non_matches: usize,
}

impl RunSummary {
    /// Classify and summarise a finished list of samples.
    pub fn compute(pattern: &Regex, elapsed: Duration, samples: &[LatencySample]) -> Self {
        let mut summary = RunSummary {
            elapsed,
            total_requests: samples.len(),
            ..Default::default()
        };
        if samples.is_empty() {
            return summary;
        }

        let mut completed = Vec::with_capacity(samples.len());
        for sample in samples {
            match &sample.outcome {
                Outcome::TimedOut => {
                    summary.total_timeouts += 1;
                }
                Outcome::Errored => {
                    summary.total_errors += 1;
                }
                Outcome::Completed { status, .. } => {
                    if pattern.is_match(status) {
                        summary.total_matches += 1;
                    } else {
                        summary.total_non_matches += 1;
                    }
                    completed.push(sample);
                }
            }
        }

        summary.connection = LatencyDistribution::from_unsorted(
            completed.iter().map(|s| s.connection).collect()
        );
        summary.server = LatencyDistribution::from_unsorted(
            completed.iter().map(|s| s.server).collect()
        );

        let mut totals: Vec<Duration> = completed.iter().map(|s| s.total()).collect();
        totals.sort_unstable();
        summary.total = LatencyDistribution::from_sorted(&totals);
        summary.histogram = Histogram::from_sorted(&totals);

        summary
    }

    /// Completed requests per second of wall time.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            ((self.total_matches + self.total_non_matches) as f64) / secs
        }
    }

    /// `count` as a percentage of all observed requests, 0 for an empty run.
    pub fn percent_of_total(&self, count: usize) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            (100.0 * (count as f64)) / (self.total_requests as f64)
        }
    }
}

/// Receive samples until `expected` have arrived, the stream closes or the
/// run is cancelled, then summarise whatever was collected.
pub async fn collect(
    expected: usize,
    pattern: &Regex,
    samples: &mut mpsc::Receiver<LatencySample>,
    cancel: &CancellationToken
) -> RunSummary {
    let start = Instant::now();
    let mut received = Vec::with_capacity(expected);

    while received.len() < expected {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Collection cancelled after {} of {} sample(s)", received.len(), expected);
                break;
            }
            sample = samples.recv() => match sample {
                Some(sample) => received.push(sample),
                None => break,
            },
        }
    }

    RunSummary::compute(pattern, start.elapsed(), &received)
}
