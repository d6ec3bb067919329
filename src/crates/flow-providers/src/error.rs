//! Error types for provider adapters.

use thiserror::Error;

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors that can occur when talking to an external provider.
///
/// These never escape a node handler: each adapter folds them into the
/// node's output, so one classification here decides whether a failure is
/// retried, swallowed into a fallback, or surfaced to the flow author.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP transport failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API authentication failed.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Rate limit or quota exceeded (HTTP 429 class).
    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    /// Provider service not reachable or not running.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Response arrived but could not be interpreted.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Node or provider configuration is unusable.
    #[error("configuration error: {0}")]
    Config(String),

    /// Provider-side error that fits no other class.
    #[error("provider error: {0}")]
    Provider(String),
}

impl ProviderError {
    /// Whether this failure belongs to the rate-limit class, the only
    /// class the chat adapter retries.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ProviderError::RateLimited(_))
    }

    /// Whether this failure is worth trying an alternate model for.
    /// Configuration errors are not: they fail the same way every time.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ProviderError::Http(_)
                | ProviderError::ServiceUnavailable(_)
                | ProviderError::Provider(_)
                | ProviderError::InvalidResponse(_)
        )
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::InvalidResponse(err.to_string())
    }
}
