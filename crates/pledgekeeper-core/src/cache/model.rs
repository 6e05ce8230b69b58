//! Cache data models.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use pledgekeeper_http::Response;

/// A response snapshot stored in a cache generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: Bytes,
    /// When the response was cached.
    pub cached_at: DateTime<Utc>,
}

impl CachedResponse {
    /// Snapshots a response.
    #[must_use]
    pub fn from_response(response: &Response) -> Self {
        Self {
            status: response.status,
            headers: response.headers.clone(),
            body: response.body.clone(),
            cached_at: Utc::now(),
        }
    }

    /// Rebuilds a response to hand back to the page.
    #[must_use]
    pub fn to_response(&self) -> Response {
        Response {
            status: self.status,
            headers: self.headers.clone(),
            body: self.body.clone(),
        }
    }
}
