use crate::error::{ Error, Result };

use std::path::PathBuf;
use std::time::Duration;
use clap::{ builder::RangedU64ValueParser, ArgAction, Parser };
use regex::Regex;
use url::Url;

const DEFAULT_STATUS_PATTERN: &str = r"2\d\d";

// Command line arguments
#[derive(Parser, Debug)]
#[command(
    name = "latbench",
    version,
    about = "Benchmark an HTTP endpoint and report connection, server and total latency",
    after_help = "Durations can be specified like: 250ms, 5s, 1m, 1h\nThe run ends when all requests finish or --timelimit elapses, whichever comes first."
)]
pub struct Cli {
    /// Concurrent workers
    #[arg(
        short = 'c',
        long,
        default_value_t = 1,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub concurrency: usize,

    /// Total number of requests
    #[arg(short = 'n', long, default_value_t = 1)]
    pub requests: usize,

    /// Request timeout (whole request/response cycle)
    #[arg(short = 't', long, value_parser = humantime::parse_duration, default_value = "5s")]
    pub timeout: Duration,

    /// Timeout for establishing the connection only
    #[arg(short = 'C', long, value_parser = humantime::parse_duration, default_value = "5s")]
    pub connect_timeout: Duration,

    /// Maximum time to spend on the whole run
    #[arg(long, value_parser = humantime::parse_duration, default_value = "600s")]
    pub timelimit: Duration,

    /// Runtime worker threads
    #[arg(
        short = 'T',
        long,
        default_value_t = default_threads(),
        value_parser = RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub threads: usize,

    /// Client certificate file (PEM)
    #[arg(long, requires = "key")]
    pub cert: Option<PathBuf>,

    /// Private key file (PEM)
    #[arg(long, requires = "cert")]
    pub key: Option<PathBuf>,

    /// Server name used for SNI and hostname verification (https only)
    #[arg(long = "server")]
    pub server_name: Option<String>,

    /// Regex matched against the status code and its canonical reason (e.g. "200 OK")
    #[arg(short = 's', long, value_parser = parse_status_pattern, default_value = DEFAULT_STATUS_PATTERN)]
    pub status: Regex,

    /// Print a compact report
    #[arg(long)]
    pub summarize: bool,

    /// Verbosity level (max: 3)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbosity: u8,

    /// URL to GET
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyPair {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TlsConfig {
    pub key_pair: Option<KeyPair>,
    pub server_name: Option<String>,
}

/// Resolved settings for one run. Nothing here changes once the run starts.
#[derive(Debug, Clone)]
pub struct Config {
    pub concurrency: usize, // number of workers
    pub requests: usize,
    pub timeout: Duration, // total time for request/response cycle including DNS resolution
    pub connect_timeout: Duration,
    pub time_limit: Duration, // deadline for the whole run
    pub threads: usize,
    pub url: Url,
    pub tls: Option<TlsConfig>,
    pub status_pattern: Regex,
    pub verbosity: u8,
    pub summarize: bool,
}

impl Config {
    /// Parse the process arguments. Usage errors exit through clap.
    pub fn parse() -> Result<Config> {
        Self::from_cli(Cli::parse())
    }

    pub fn from_cli(cli: Cli) -> Result<Config> {
        let url = parse_url(&cli.url)?;

        let key_pair = match (cli.cert, cli.key) {
            (Some(cert_path), Some(key_path)) => Some(KeyPair { cert_path, key_path }),
            _ => None,
        };
        let server_name = cli.server_name.filter(|name| !name.is_empty());
        let tls = if key_pair.is_some() || server_name.is_some() {
            Some(TlsConfig { key_pair, server_name })
        } else {
            None
        };

        Ok(Config {
            concurrency: cli.concurrency,
            requests: cli.requests,
            timeout: cli.timeout,
            connect_timeout: cli.connect_timeout,
            time_limit: cli.timelimit,
            threads: cli.threads,
            url,
            tls,
            status_pattern: cli.status,
            verbosity: cli.verbosity,
            summarize: cli.summarize,
        })
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|source| Error::InvalidUrl {
        url: raw.to_string(),
        source,
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::UnsupportedScheme(other.to_string())),
    }
}

fn parse_status_pattern(pattern: &str) -> std::result::Result<Regex, regex::Error> {
    Regex::new(pattern)
}

fn default_threads() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}
