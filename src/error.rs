//! Error taxonomy for the query core.
//!
//! Validation errors (`UnsupportedUrl`, `InvalidDescription`, `DuplicateQuery`, `NotFound`)
//! are user-correctable and always reach the caller unmodified. Fetch errors carry enough
//! detail (status code, retry hint) for the caller to apply its own backoff policy.

use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;
use crate::fetch::transport::TransportError;
use crate::provider::ProviderId;
use crate::query::QueryId;

/// Errors raised while normalizing URLs or managing saved queries.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Unsupported URL: {0}")]
    UnsupportedUrl(String),

    #[error("A {0} username must be configured to resolve your own favorites")]
    MissingUsername(ProviderId),

    #[error("Invalid description: {0}")]
    InvalidDescription(String),

    #[error("Query already exists: {0}")]
    DuplicateQuery(QueryId),

    #[error("Identity collision for {id}: stored '{existing}', submitted '{incoming}'")]
    IdentityCollision {
        id: QueryId,
        existing: String,
        incoming: String,
    },

    #[error("Query not found: {0}")]
    NotFound(QueryId),

    #[error("Failed to persist queries: {0}")]
    Persistence(#[from] ConfigError),
}

/// Result type for normalizer and store operations
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors raised by the fetch client and the enricher.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Invalid query URL: {0}")]
    InvalidQuery(String),

    #[error("Provider returned HTTP {status}")]
    Provider {
        status: u16,
        retry_after: Option<Duration>,
    },

    #[error("Failed to decode provider response: {0}")]
    Decode(String),

    #[error("Request canceled")]
    Canceled,

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl FetchError {
    /// The HTTP status if the provider answered with a non-2xx response.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Provider { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the provider rejected the request for rate limiting.
    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(429)
    }
}

/// Result type for fetch operations
pub type FetchResult<T> = Result<T, FetchError>;
