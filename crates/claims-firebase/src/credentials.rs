//! Credential file and connection settings
//!
//! The credential file is the service-account JSON of the project. Only
//! `project_id` is required. The bearer token is chosen in this order:
//! 1. `access_token` in the file
//! 2. `GOOGLE_OAUTH_ACCESS_TOKEN`
//! 3. the emulator token, when both emulator hosts are set
//! 4. a token minted from `client_email` + `private_key`

use crate::error::CredentialsError;
use crate::oauth::{ServiceAccountKey, DEFAULT_TOKEN_URI};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Default credential file name
pub const DEFAULT_CREDENTIALS_FILE: &str = "credentials.json";
/// Bearer token variable
pub const ENV_ACCESS_TOKEN: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";
/// Firestore emulator `host:port`
pub const ENV_FIRESTORE_EMULATOR: &str = "FIRESTORE_EMULATOR_HOST";
/// Auth emulator `host:port`
pub const ENV_AUTH_EMULATOR: &str = "FIREBASE_AUTH_EMULATOR_HOST";

const FIRESTORE_URL: &str = "https://firestore.googleapis.com";
const IDENTITY_URL: &str = "https://identitytoolkit.googleapis.com";
const EMULATOR_TOKEN: &str = "owner";
const DEFAULT_PAGE_SIZE: u32 = 300;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Fields read from the credential file
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ServiceCredentials {
    /// Firebase / GCP project
    pub project_id: String,
    /// Service account identity
    #[serde(default)]
    pub client_email: Option<String>,
    /// PEM key of the service account
    #[serde(default)]
    pub private_key: Option<String>,
    /// Id of `private_key`
    #[serde(default)]
    pub private_key_id: Option<String>,
    /// OAuth token endpoint
    #[serde(default)]
    pub token_uri: Option<String>,
    /// Pre-minted OAuth access token, overrides the service account
    #[serde(default)]
    pub access_token: Option<String>,
}

impl std::fmt::Debug for ServiceCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceCredentials")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("token_uri", &self.token_uri)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl ServiceCredentials {
    /// Signing key, when the file is a complete service-account key
    #[must_use]
    pub fn service_account_key(&self) -> Option<ServiceAccountKey> {
        let non_blank = |v: &Option<String>| v.clone().filter(|s| !s.trim().is_empty());
        Some(ServiceAccountKey {
            client_email: non_blank(&self.client_email)?,
            private_key: non_blank(&self.private_key)?,
            private_key_id: non_blank(&self.private_key_id),
            token_uri: non_blank(&self.token_uri).unwrap_or_else(|| DEFAULT_TOKEN_URI.to_owned()),
        })
    }

    /// Load and validate `path`
    ///
    /// # Errors
    /// Unreadable file, invalid JSON, or blank `project_id`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CredentialsError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| CredentialsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let credentials: Self =
            serde_json::from_str(&raw).map_err(|source| CredentialsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        if credentials.project_id.trim().is_empty() {
            return Err(CredentialsError::MissingProject);
        }
        Ok(credentials)
    }
}

/// Resolved connection settings for both backends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirebaseSettings {
    /// Project id
    pub project_id: String,
    /// Bearer token
    pub access_token: String,
    /// Firestore root URL
    pub firestore_url: String,
    /// Identity Toolkit root URL
    pub identity_url: String,
    /// Documents per listing page
    pub page_size: u32,
    /// Per-request timeout
    pub timeout: Duration,
}

impl FirebaseSettings {
    /// Settings pointing at explicit endpoints
    #[must_use]
    pub fn new(
        project_id: impl Into<String>,
        access_token: impl Into<String>,
        firestore_url: impl Into<String>,
        identity_url: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            access_token: access_token.into(),
            firestore_url: firestore_url.into(),
            identity_url: identity_url.into(),
            page_size: DEFAULT_PAGE_SIZE,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Resolve settings from credentials and the process environment
    ///
    /// # Errors
    /// See [`FirebaseSettings::resolve`].
    pub async fn from_env(credentials: &ServiceCredentials) -> Result<Self, CredentialsError> {
        Self::resolve(credentials, |key| std::env::var(key).ok()).await
    }

    /// Resolve settings from credentials and an environment lookup
    ///
    /// # Errors
    /// `MissingAccessToken` when a production endpoint is used and there is
    /// neither a token nor a service-account key; token exchange failures.
    pub async fn resolve(
        credentials: &ServiceCredentials,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, CredentialsError> {
        let lookup = |key: &str| env(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let firestore_emulator = lookup(ENV_FIRESTORE_EMULATOR);
        let auth_emulator = lookup(ENV_AUTH_EMULATOR);
        let fully_emulated = firestore_emulator.is_some() && auth_emulator.is_some();

        let firestore_url = firestore_emulator
            .map_or_else(|| FIRESTORE_URL.to_owned(), |host| format!("http://{host}"));
        let identity_url = auth_emulator.map_or_else(
            || IDENTITY_URL.to_owned(),
            |host| format!("http://{host}/identitytoolkit.googleapis.com"),
        );

        let access_token = credentials
            .access_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| lookup(ENV_ACCESS_TOKEN));
        let access_token = match (access_token, credentials.service_account_key()) {
            (Some(token), _) => token,
            (None, _) if fully_emulated => EMULATOR_TOKEN.to_owned(),
            (None, Some(key)) => {
                key.fetch_access_token(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
                    .await?
            }
            (None, None) => return Err(CredentialsError::MissingAccessToken(ENV_ACCESS_TOKEN)),
        };

        Ok(Self::new(
            credentials.project_id.clone(),
            access_token,
            firestore_url,
            identity_url,
        ))
    }

    /// With request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// With listing page size
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}
