use thiserror::Error;

/// Application-wide error types for Roost.
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP request failed in a way that is not worth retrying
    /// (malformed URL, blocked scheme, unreadable body).
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Upstream returned a non-success status code.
    #[error("Upstream returned HTTP {status} for {url}")]
    UpstreamStatus { status: u16, url: String },

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Rate limit exceeded (HTTP 429 or provider-signalled).
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Network/connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// A raw item could not be normalized into a listing.
    /// Skips the item, never aborts the crawl.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Invalid or incomplete source configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Missing or rejected credentials for an upstream service.
    #[error("Authentication error: {0}")]
    AuthError(String),

    /// The requested source id is not registered.
    #[error("Source not found: {0}")]
    SourceNotFound(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic error.
    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Returns true if this is a transient fetch failure: the current run
    /// stops paginating, keeps what it has, and the source is eligible for
    /// retry on its next scheduled crawl.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::NetworkError(_) | AppError::Timeout(_) | AppError::RateLimitExceeded => true,
            AppError::UpstreamStatus { status, .. } => {
                *status == 408 || *status == 429 || *status >= 500
            }
            _ => false,
        }
    }

    /// Returns true if this error aborts the entire run before any store
    /// mutation: bad configuration, missing credentials, unknown source.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::ConfigError(_) | AppError::AuthError(_) | AppError::SourceNotFound(_)
        )
    }
}
