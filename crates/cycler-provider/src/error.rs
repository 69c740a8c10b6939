//! Provider error types.

use thiserror::Error;

/// Errors surfaced by provider API calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The target resource does not exist (any more).
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The request was rejected or failed in transport.
    #[error("request failed: {0}")]
    Request(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;
