//! Error types for the core library.

use thiserror::Error;

use crate::store::DonationStatus;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Network or request-model failure.
    #[error("HTTP error: {0}")]
    Http(#[from] pledgekeeper_http::Error),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Schema migration failed; the store was left at the previous version.
    #[error("Schema migration to version {version} failed: {reason}")]
    Migration {
        /// Version the migration was upgrading to.
        version: i64,
        /// Underlying cause.
        reason: String,
    },

    /// A resource from the critical install manifest could not be cached.
    #[error("Critical resource {key} could not be cached: {reason}")]
    CriticalResource {
        /// Cache key of the resource.
        key: String,
        /// Underlying cause.
        reason: String,
    },

    /// An offline donation status change that only moves backwards or sideways.
    #[error("Record {id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Record id.
        id: i64,
        /// Current status.
        from: DonationStatus,
        /// Requested status.
        to: DonationStatus,
    },

    /// An install version whose generation name is reserved.
    #[error("Version {0:?} collides with the fallback cache")]
    InvalidVersion(String),

    /// Record not found.
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// Notification surface failure.
    #[error("Notification error: {0}")]
    Notification(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
