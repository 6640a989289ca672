//! Error types

use std::time::Duration;
use thiserror::Error;

/// Upstream fetch errors
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to upstream failed: {0}")]
    Request(String),

    #[error("Cannot access api, status code: {0}")]
    Status(u16),

    #[error("Malformed response body: {0}")]
    MalformedBody(String),

    #[error("Upstream did not respond within {0:?}")]
    Timeout(Duration),
}

/// Read-side lookup errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("Asset not found: {0}")]
    NotFound(String),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type alias
pub type FetchResult<T> = Result<T, FetchError>;
pub type QueryResult<T> = Result<T, QueryError>;
