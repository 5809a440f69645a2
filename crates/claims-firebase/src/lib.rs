//! Claims Firebase - REST backends for the claims migration
//!
//! - [`FirestoreDocumentStore`] lists `stores` and `users`
//! - [`IdentityToolkitClaimsStore`] reads and writes custom claims and
//!   invalidates sessions
//!
//! Both are constructed explicitly from [`FirebaseSettings`]; nothing is
//! initialized lazily or held globally.

#![warn(unreachable_pub)]

pub mod credentials;
pub mod error;
pub mod firestore;
mod http;
pub mod identity;
pub mod oauth;

pub use credentials::{FirebaseSettings, ServiceCredentials, DEFAULT_CREDENTIALS_FILE};
pub use error::CredentialsError;
pub use firestore::FirestoreDocumentStore;
pub use identity::IdentityToolkitClaimsStore;
pub use oauth::ServiceAccountKey;

use std::path::Path;
use std::sync::Arc;

/// Both backends for one project
#[derive(Debug, Clone)]
pub struct FirebaseClients {
    /// `stores` / `users` reader
    pub documents: Arc<FirestoreDocumentStore>,
    /// Claims reader/writer
    pub claims: Arc<IdentityToolkitClaimsStore>,
}

impl FirebaseClients {
    /// Build both clients from resolved settings
    ///
    /// # Errors
    /// The HTTP client could not be built.
    pub fn connect(settings: &FirebaseSettings) -> Result<Self, CredentialsError> {
        tracing::info!(
            project = %settings.project_id,
            firestore = %settings.firestore_url,
            identity = %settings.identity_url,
            "connecting to firebase"
        );
        Ok(Self {
            documents: Arc::new(FirestoreDocumentStore::new(settings)?),
            claims: Arc::new(IdentityToolkitClaimsStore::new(settings)?),
        })
    }

    /// Load `credentials_path`, resolve against the environment (minting a
    /// token from the service account when needed), connect
    ///
    /// # Errors
    /// Any credential, token exchange or client construction failure.
    pub async fn from_credentials_file(
        credentials_path: impl AsRef<Path>,
        configure: impl FnOnce(FirebaseSettings) -> FirebaseSettings,
    ) -> Result<Self, CredentialsError> {
        let credentials = ServiceCredentials::load(credentials_path)?;
        let settings = configure(FirebaseSettings::from_env(&credentials).await?);
        Self::connect(&settings)
    }
}
