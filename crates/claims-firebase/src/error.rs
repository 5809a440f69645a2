//! Error types for the Firebase backends

use claims_core::{ClaimsStoreError, DocumentStoreError};
use std::path::PathBuf;

/// Failures resolving credentials or building clients
#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    /// Credential file could not be read
    #[error("cannot read credentials {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Credential file is not valid JSON of the expected shape
    #[error("invalid credentials {path}: {source}")]
    Parse {
        /// File path
        path: PathBuf,
        /// Decode error
        #[source]
        source: serde_json::Error,
    },

    /// `project_id` is missing or blank
    #[error("credentials have no project_id")]
    MissingProject,

    /// No bearer token available for a non-emulated service
    #[error("no access token: use a service account key file, set access_token in it, or set {0}")]
    MissingAccessToken(&'static str),

    /// The service-account key cannot sign an assertion
    #[error("invalid service account key: {0}")]
    InvalidKey(String),

    /// The token endpoint refused or could not be reached
    #[error("access token exchange failed: {0}")]
    TokenExchange(String),

    /// The HTTP client could not be built
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// Failure of one REST call, before it is mapped onto a store error
#[derive(Debug, thiserror::Error)]
pub(crate) enum HttpError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Decode(String),
}

impl HttpError {
    /// Backend error code such as `USER_NOT_FOUND`, if the body carries one
    pub(crate) fn is_code(&self, code: &str) -> bool {
        matches!(self, Self::Status { body, .. } if body.contains(code))
    }
}

impl From<HttpError> for DocumentStoreError {
    fn from(error: HttpError) -> Self {
        match error {
            HttpError::Transport(message) => Self::Transport(message),
            HttpError::Status { status, body } => Self::Status { status, body },
            HttpError::Decode(reason) => Self::Other(reason),
        }
    }
}

impl From<HttpError> for ClaimsStoreError {
    fn from(error: HttpError) -> Self {
        match error {
            HttpError::Transport(message) => Self::Transport(message),
            HttpError::Status { status, body } => Self::Status { status, body },
            HttpError::Decode(reason) => Self::Other(reason),
        }
    }
}
