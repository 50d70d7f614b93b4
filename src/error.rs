use std::net::IpAddr;
use std::path::PathBuf;
use thiserror::Error;

/// A listing page could not be turned into candidates.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot build client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
}

/// Why a candidate proxy did not pass the probe.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("refusing non-public address {0}")]
    UnsafeAddress(IpAddr),
    #[error("cannot use proxy: {0}")]
    Client(#[source] reqwest::Error),
    #[error("probe failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("probe answered with status {0}")]
    Status(u16),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("pool file {0} does not exist")]
    NotFound(PathBuf),
    #[error("pool snapshot is {age_hours}h old")]
    Stale { age_hours: i64 },
    #[error("bad snapshot timestamp `{0}`")]
    Timestamp(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("cannot build client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Request(e)
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("giving up on {url} after {attempts} attempts")]
    AttemptsExhausted { url: String, attempts: u32 },
}
