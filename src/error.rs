//! Error types for each external boundary.
//!
//! Only [`CorpusError`] on write and [`ConfigError`] are ever fatal for a run.
//! Search and secondary-classifier failures are contained per unit or per record.

use std::path::PathBuf;
use thiserror::Error;

/// Failure calling the external search capability for one query.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("rate limited by search service (status {status})")]
    RateLimited { status: u16 },

    #[error("search request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("search service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed search response: {0}")]
    Malformed(String),

    #[error("search authentication failed: {0}")]
    Auth(String),

    #[error("invalid search url: {0}")]
    Url(#[from] url::ParseError),
}

/// Failure talking to the secondary classifier.
///
/// Unparseable model output is not an error: it becomes the zero-confidence
/// sentinel verdict instead.
#[derive(Debug, Error)]
pub enum SecondaryError {
    #[error("secondary classifier unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),

    #[error("secondary classifier returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model not available: {0}")]
    ModelNotAvailable(String),

    #[error("secondary classifier envelope could not be decoded: {0}")]
    Envelope(String),
}

/// Failure reading or writing a corpus file.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("corpus i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corpus serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Failure loading the collection config or compiling its keyword tables.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid keyword pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
