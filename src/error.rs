//! Typed errors for the classification and retrieval engine.
//!
//! Normalization rejections, stale writes and unknown taxonomy keys are not
//! errors: they resolve to no-ops or empty results. Everything listed here is
//! surfaced to the caller.

use thiserror::Error;

/// Message returned to API clients for malformed pagination parameters.
pub const INVALID_PAGINATION_MESSAGE: &str = "Parameters `start` and `limit` must be integers";

#[derive(Debug, Error)]
pub enum Error {
    /// Bad pagination input from a client.
    #[error("{0}")]
    InvalidParameters(&'static str),

    /// The page store failed or is unavailable.
    #[error("store error: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration is present but unusable.
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    pub fn invalid_pagination() -> Self {
        Error::InvalidParameters(INVALID_PAGINATION_MESSAGE)
    }

    pub fn store<E>(e: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Store(Box::new(e))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::store(e)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
