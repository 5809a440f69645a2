//! Error types for the claims migration
//!
//! Two tiers:
//! - Collaborator errors (`DocumentStoreError`, `ClaimsStoreError`, `ReportError`)
//!   raised by a single call against an external system
//! - `MigrationError`, the run-level error that aborts a migration

use crate::migrator::RunSummary;

/// Run-level error; anything surfacing as this stops the migration
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// A collection could not be enumerated
    #[error("failed to list collection '{collection}': {source}")]
    Listing {
        /// Collection name
        collection: &'static str,
        /// Underlying store failure
        #[source]
        source: DocumentStoreError,
    },

    /// Ownership index could not be built
    #[error("ownership index rejected: {0}")]
    Index(#[from] IndexError),

    /// The run finished but its report could not be persisted
    #[error("report not written: {source}")]
    ReportNotWritten {
        /// Sink failure
        #[source]
        source: ReportError,
        /// Everything the run did
        summary: Box<RunSummary>,
    },

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl MigrationError {
    /// Wrap a listing failure for `collection`
    #[inline]
    #[must_use]
    pub fn listing(collection: &'static str, source: DocumentStoreError) -> Self {
        Self::Listing { collection, source }
    }
}

/// Failures reading the document store
#[derive(Debug, thiserror::Error)]
pub enum DocumentStoreError {
    /// Transport-level failure (connect, timeout, TLS)
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with a non-success status
    #[error("backend returned {status}: {body}")]
    Status {
        /// HTTP-ish status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },

    /// A document could not be decoded
    #[error("malformed document {id}: {reason}")]
    Malformed {
        /// Document id or resource name
        id: String,
        /// What was wrong
        reason: String,
    },

    /// Anything else the backend reports
    #[error("{0}")]
    Other(String),
}

/// Failures against the identity / claims store
#[derive(Debug, thiserror::Error)]
pub enum ClaimsStoreError {
    /// No identity with this uid exists
    #[error("no identity with uid '{0}'")]
    UserNotFound(String),

    /// Transport-level failure
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with a non-success status
    #[error("backend returned {status}: {body}")]
    Status {
        /// HTTP-ish status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },

    /// Stored claims were not a JSON object
    #[error("invalid claims for '{uid}': {reason}")]
    InvalidClaims {
        /// Identity uid
        uid: String,
        /// Decode failure
        reason: String,
    },

    /// Anything else the backend reports
    #[error("{0}")]
    Other(String),
}

/// Ownership index construction errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    /// Two stores name the same owner
    #[error("owner '{owner_id}' owns both '{first}' and '{second}'")]
    DuplicateOwner {
        /// Shared owner id
        owner_id: String,
        /// Store indexed first
        first: String,
        /// Store seen later
        second: String,
    },
}

/// Report persistence errors
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// Serialization failed
    #[error("serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Filesystem failure
    #[error("write {path}: {source}")]
    Io {
        /// Target path
        path: std::path::PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// A report with this name already exists
    #[error("report already exists: {0}")]
    AlreadyExists(std::path::PathBuf),
}

impl ReportError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<std::path::PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
