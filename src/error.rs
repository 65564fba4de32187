//! Error types.
//!
//! [`MirrorError`] aborts a run. Everything else is scoped to a single
//! resource: the drivers log it and move on to the next one.

use std::path::PathBuf;

use thiserror::Error;

/// Failures that stop the whole mirror run.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("invalid target url `{url}`: {reason}")]
    InvalidTarget { url: String, reason: String },

    #[error("failed to fetch root document {url}: {source}")]
    RootFetch {
        url: String,
        #[source]
        source: ResourceError,
    },

    #[error("failed to build http client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("browser session failed: {0}")]
    Browser(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Network failure fetching one resource.
#[derive(Debug, Error)]
#[error("request to {url} failed: {source}")]
pub struct FetchError {
    pub url: String,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl FetchError {
    pub fn new(
        url: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            url: url.into(),
            source: source.into(),
        }
    }
}

/// The body could not be turned back into plain bytes.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unsupported content-encoding `{0}`")]
    Unsupported(String),

    #[error("malformed {encoding} stream: {source}")]
    Malformed {
        encoding: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Filesystem failure persisting one resource.
#[derive(Debug, Error)]
#[error("failed to write {}: {source}", .path.display())]
pub struct WriteError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Anything that can go wrong while mirroring a single resource.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("invalid resource url `{url}`: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Write(#[from] WriteError),
}
