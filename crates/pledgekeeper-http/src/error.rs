//! Error types for fetch operations.

/// Result type alias for fetch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Fetch error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Unsupported request method.
    #[error("Invalid method: {0}")]
    InvalidMethod(String),

    /// The network could not be reached.
    #[error("Network unreachable: {0}")]
    Unreachable(String),
}

impl Error {
    /// Returns true if the error means the network was not reachable at all,
    /// as opposed to a malformed request or response.
    #[must_use]
    pub fn is_network(&self) -> bool {
        match self {
            Self::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            Self::Unreachable(_) => true,
            Self::Json(_) | Self::Url(_) | Self::InvalidMethod(_) => false,
        }
    }
}
