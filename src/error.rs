use std::path::PathBuf;
use thiserror::Error;

/// Setup failures. Anything that goes wrong with an individual request is
/// recorded on its sample instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid URL \"{url}\": {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("Unsupported URL scheme \"{0}\" (expected http or https)")]
    UnsupportedScheme(String),
    #[error("Failed to read {kind} from {path}: {source}")]
    TlsMaterial {
        kind: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path} does not contain a PEM encoded {kind}")]
    InvalidPem {
        kind: &'static str,
        path: PathBuf,
    },
    #[error("Failed to resolve {host}: {reason}")]
    Resolve { host: String, reason: String },
    #[error("HTTP client error: {0}")]
    Client(#[from] isahc::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Dispatcher task failed: {0}")]
    Dispatcher(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, Error>;
