//! Collaborator seams
//!
//! The driver talks to the outside world only through these traits. Backends
//! live elsewhere (`claims-firebase` for REST, [`crate::memory`] for tests).

use crate::error::{ClaimsStoreError, DocumentStoreError};
use crate::types::{ClaimSet, StoreRecord, UserRecord};
use async_trait::async_trait;

/// Read-only access to the `stores` and `users` collections
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every document in `stores`, in backend order
    async fn list_stores(&self) -> Result<Vec<StoreRecord>, DocumentStoreError>;

    /// Every document in `users`, in backend order
    async fn list_users(&self) -> Result<Vec<UserRecord>, DocumentStoreError>;
}

/// Read-write access to custom claims and sessions
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClaimsStore: Send + Sync {
    /// Current claims; `UserNotFound` for an unknown uid
    async fn get_claims(&self, uid: &str) -> Result<ClaimSet, ClaimsStoreError>;

    /// Replace the whole claim set for `uid`
    async fn set_claims(&self, uid: &str, claims: &ClaimSet) -> Result<(), ClaimsStoreError>;

    /// Invalidate every session issued to `uid`
    async fn revoke_sessions(&self, uid: &str) -> Result<(), ClaimsStoreError>;
}
