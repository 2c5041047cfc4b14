use crate::stats::{ Histogram, LatencyDistribution, RunSummary };

use std::io::{ self, Write };
use std::time::Duration;
use url::Url;

const FIELD_WIDTH: usize = 24; //  width of each field for formatting print

/// Human readable rendering of a finished run.
#[derive(Debug)]
pub struct Report<'a> {
    pub summary: &'a RunSummary,
    pub url: &'a Url,
    pub concurrency: usize,
}

impl<'a> Report<'a> {
    pub fn new(summary: &'a RunSummary, url: &'a Url, concurrency: usize) -> Self {
        Self { summary, url, concurrency }
    }

    /// Print the report to stdout
    pub fn print(&self, summarize: bool) -> io::Result<()> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        if summarize {
            self.write_summarized(&mut out)
        } else {
            self.write_full(&mut out)
        }
    }

    pub fn write_full(&self, out: &mut impl Write) -> io::Result<()> {
        let s = self.summary;
        let w = FIELD_WIDTH;

        writeln!(out, "{:<w$}{}", "URL:", self.url)?;
        writeln!(out, "{:<w$}{}\n", "Concurrency Level:", self.concurrency)?;

        writeln!(out, "{:<w$}{}", "Total Requests:", s.total_requests)?;
        self.write_count(out, "Errors:", s.total_errors)?;
        self.write_count(out, "Timeouts:", s.total_timeouts)?;
        self.write_count(out, "Status Matches:", s.total_matches)?;
        self.write_count(out, "Status Mismatches:", s.total_non_matches)?;
        writeln!(out, "{:<w$}{:.2}", "Requests/sec:", s.throughput())?;
        writeln!(out, "{:<w$}{:.2}s", "Total Time Taken:", s.elapsed.as_secs_f64())?;
        writeln!(out)?;

        Self::write_distribution(
            out,
            "Connection latency (DNS lookup and TCP connect):",
            &s.connection
        )?;
        Self::write_distribution(
            out,
            "Server latency (TLS handshake and response once connected):",
            &s.server
        )?;
        Self::write_distribution(out, "Total latency:", &s.total)?;

        Self::write_histogram(out, &s.histogram)
    }

    pub fn write_summarized(&self, out: &mut impl Write) -> io::Result<()> {
        let s = self.summary;
        writeln!(
            out,
            "Sent {} requests to {} in {:.2}s, {:.2} req/s",
            s.total_requests,
            self.url,
            s.elapsed.as_secs_f64(),
            s.throughput()
        )?;
        if s.total_errors > 0 || s.total_timeouts > 0 {
            writeln!(out, "Errors: {}, Timeouts: {}", s.total_errors, s.total_timeouts)?;
        }
        writeln!(out, "Status matches: {}/{}", s.total_matches, s.total_requests)?;

        writeln!(
            out,
            " {:<12} {:<10} {:<10} {:<10} {:<10} {:<10}",
            "",
            "Avg",
            "Min",
            "Max",
            "p50",
            "p99"
        )?;
        for (name, dist) in [
            ("Connection", &s.connection),
            ("Server", &s.server),
            ("Total", &s.total),
        ] {
            writeln!(
                out,
                " {:<12} {:<10} {:<10} {:<10} {:<10} {:<10}",
                name,
                format_latency(dist.mean),
                format_latency(dist.minimum),
                format_latency(dist.maximum),
                format_latency(dist.percentiles.p50),
                format_latency(dist.percentiles.p99)
            )?;
        }
        Ok(())
    }

    /*-------------------==| Private/Helpers |==----------------------- */

    fn write_count(&self, out: &mut impl Write, label: &str, count: usize) -> io::Result<()> {
        writeln!(
            out,
            "{:<w$}{} ({:.2}%)",
            label,
            count,
            self.summary.percent_of_total(count),
            w = FIELD_WIDTH
        )
    }

    fn write_distribution(
        out: &mut impl Write,
        title: &str,
        dist: &LatencyDistribution
    ) -> io::Result<()> {
        let p = &dist.percentiles;
        writeln!(out, "{}", title)?;
        writeln!(out, " {:<10} {}", "Min", format_latency(dist.minimum))?;
        writeln!(out, " {:<10} {}", "Max", format_latency(dist.maximum))?;
        writeln!(out, " {:<10} {}", "Avg", format_latency(dist.mean))?;
        writeln!(out, " {:<10} {}", "50%", format_latency(p.p50))?;
        writeln!(out, " {:<10} {}", "75%", format_latency(p.p75))?;
        writeln!(out, " {:<10} {}", "90%", format_latency(p.p90))?;
        writeln!(out, " {:<10} {}", "95%", format_latency(p.p95))?;
        writeln!(out, " {:<10} {}", "99%", format_latency(p.p99))?;
        writeln!(out)
    }

    /// For printing latency histogram
    fn write_histogram(out: &mut impl Write, histogram: &Histogram) -> io::Result<()> {
        if histogram.counts.is_empty() {
            return Ok(()); // nothing completed
        }

        let bucket_ms = histogram.bucket_size.as_secs_f64() * 1000.0;
        writeln!(out, "{:<15} {:<15} {:>10}", "Range (ms)", "Upper Bound", "Requests")?;
        for (i, &count) in histogram.counts.iter().enumerate() {
            let lower_bound = (i as f64) * bucket_ms;
            let upper_bound = ((i as f64) + 1.0) * bucket_ms;
            writeln!(out, "{:<15.2} {:<15.2} {:>10}", lower_bound, upper_bound, count)?;
        }
        Ok(())
    }
}

// convert into seconds if the value is at least one second
pub fn format_latency(value: Duration) -> String {
    let ms = value.as_secs_f64() * 1000.0;
    if ms >= 1000.0 {
        format!("{:.2}s", ms / 1000.0)
    } else {
        format!("{:.2}ms", ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::LatencySample;
    use regex::Regex;

    fn sample_summary() -> RunSummary {
        let samples = vec![
            LatencySample::completed(
                Duration::from_millis(1),
                Duration::from_millis(9),
                200,
                "200 OK".to_string()
            ),
            LatencySample::completed(
                Duration::from_millis(3),
                Duration::from_millis(27),
                404,
                "404 Not Found".to_string()
            ),
            LatencySample::timed_out(),
            LatencySample::errored()
        ];
        RunSummary::compute(&Regex::new(r"2\d\d").unwrap(), Duration::from_secs(2), &samples)
    }

    fn render(summarize: bool, summary: &RunSummary) -> String {
        let url = Url::parse("http://localhost:8080/").unwrap();
        let report = Report::new(summary, &url, 4);
        let mut out = Vec::new();
        if summarize {
            report.write_summarized(&mut out).unwrap();
        } else {
            report.write_full(&mut out).unwrap();
        }
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn formats_latency_units() {
        assert_eq!(format_latency(Duration::from_micros(1500)), "1.50ms");
        assert_eq!(format_latency(Duration::from_millis(999)), "999.00ms");
        assert_eq!(format_latency(Duration::from_millis(2500)), "2.50s");
        assert_eq!(format_latency(Duration::ZERO), "0.00ms");
    }

    #[test]
    fn full_report_shows_counts_with_percentages() {
        let text = render(false, &sample_summary());

        assert!(text.contains("Total Requests:         4"));
        assert!(text.contains("Errors:                 1 (25.00%)"));
        assert!(text.contains("Timeouts:               1 (25.00%)"));
        assert!(text.contains("Status Matches:         1 (25.00%)"));
        assert!(text.contains("Status Mismatches:      1 (25.00%)"));
        assert!(text.contains("Total latency:"));
        assert!(text.contains(" Max        30.00ms"));
        assert!(text.contains("Range (ms)"));
    }

    #[test]
    fn summarized_report_has_one_row_per_dimension() {
        let text = render(true, &sample_summary());

        assert!(text.starts_with("Sent 4 requests to http://localhost:8080/"));
        assert!(text.contains("Errors: 1, Timeouts: 1"));
        assert!(text.contains(" Connection "));
        assert!(text.contains(" Server "));
        assert!(text.contains(" Total "));
    }

    #[test]
    fn empty_run_renders_without_histogram() {
        let summary = RunSummary::default();
        let text = render(false, &summary);

        assert!(text.contains("Errors:                 0 (0.00%)"));
        assert!(!text.contains("Range (ms)"));
    }
}
