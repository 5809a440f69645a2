//! In-memory collaborators
//!
//! Deterministic stand-ins for the document and claims stores, with call
//! counters and per-uid failure injection. Used by the test suites and for
//! rehearsing a run without a backend.

use crate::error::{ClaimsStoreError, DocumentStoreError};
use crate::store::{ClaimsStore, DocumentStore};
use crate::types::{ClaimSet, StoreRecord, UserRecord};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

/// Fixed `stores` and `users` listings
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocumentStore {
    stores: Vec<StoreRecord>,
    users: Vec<UserRecord>,
    fail_stores: bool,
    fail_users: bool,
}

impl InMemoryDocumentStore {
    /// Store serving the given listings
    #[must_use]
    pub fn new(stores: Vec<StoreRecord>, users: Vec<UserRecord>) -> Self {
        Self {
            stores,
            users,
            ..Self::default()
        }
    }

    /// Make `list_stores` fail
    #[must_use]
    pub fn failing_stores(mut self) -> Self {
        self.fail_stores = true;
        self
    }

    /// Make `list_users` fail
    #[must_use]
    pub fn failing_users(mut self) -> Self {
        self.fail_users = true;
        self
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn list_stores(&self) -> Result<Vec<StoreRecord>, DocumentStoreError> {
        if self.fail_stores {
            return Err(DocumentStoreError::Other("injected stores listing failure".into()));
        }
        Ok(self.stores.clone())
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, DocumentStoreError> {
        if self.fail_users {
            return Err(DocumentStoreError::Other("injected users listing failure".into()));
        }
        Ok(self.users.clone())
    }
}

/// Calls observed by [`InMemoryClaimsStore`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// `get_claims`
    pub gets: usize,
    /// `set_claims`
    pub sets: usize,
    /// `revoke_sessions`
    pub revokes: usize,
}

#[derive(Debug, Default)]
struct ClaimsState {
    claims: HashMap<String, ClaimSet>,
    revoked: HashMap<String, usize>,
    calls: HashMap<String, CallCounts>,
}

/// Identity store keyed by uid
///
/// Only uids registered with [`InMemoryClaimsStore::with_identity`] exist;
/// any other uid answers `UserNotFound`.
#[derive(Debug, Default)]
pub struct InMemoryClaimsStore {
    state: Mutex<ClaimsState>,
    fail_get: HashSet<String>,
    fail_set: HashSet<String>,
    fail_revoke: HashSet<String>,
}

impl InMemoryClaimsStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an identity holding `claims`
    #[must_use]
    pub fn with_identity(self, uid: impl Into<String>, claims: ClaimSet) -> Self {
        self.state.lock().claims.insert(uid.into(), claims);
        self
    }

    /// `get_claims` fails for `uid`
    #[must_use]
    pub fn failing_get(mut self, uid: impl Into<String>) -> Self {
        self.fail_get.insert(uid.into());
        self
    }

    /// `set_claims` fails for `uid`
    #[must_use]
    pub fn failing_set(mut self, uid: impl Into<String>) -> Self {
        self.fail_set.insert(uid.into());
        self
    }

    /// `revoke_sessions` fails for `uid`
    #[must_use]
    pub fn failing_revoke(mut self, uid: impl Into<String>) -> Self {
        self.fail_revoke.insert(uid.into());
        self
    }

    /// Current claims for `uid`
    #[must_use]
    pub fn claims(&self, uid: &str) -> Option<ClaimSet> {
        self.state.lock().claims.get(uid).cloned()
    }

    /// Successful revocations for `uid`
    #[must_use]
    pub fn revocations(&self, uid: &str) -> usize {
        self.state.lock().revoked.get(uid).copied().unwrap_or(0)
    }

    /// Calls made for `uid`
    #[must_use]
    pub fn calls_for(&self, uid: &str) -> CallCounts {
        self.state.lock().calls.get(uid).copied().unwrap_or_default()
    }

    /// Calls made across all uids
    #[must_use]
    pub fn total_calls(&self) -> CallCounts {
        self.state
            .lock()
            .calls
            .values()
            .fold(CallCounts::default(), |acc, c| CallCounts {
                gets: acc.gets + c.gets,
                sets: acc.sets + c.sets,
                revokes: acc.revokes + c.revokes,
            })
    }

    fn count(state: &mut ClaimsState, uid: &str, bump: impl FnOnce(&mut CallCounts)) {
        bump(state.calls.entry(uid.to_owned()).or_default());
    }
}

#[async_trait]
impl ClaimsStore for InMemoryClaimsStore {
    async fn get_claims(&self, uid: &str) -> Result<ClaimSet, ClaimsStoreError> {
        let mut state = self.state.lock();
        Self::count(&mut state, uid, |c| c.gets += 1);
        if self.fail_get.contains(uid) {
            return Err(ClaimsStoreError::Transport("injected lookup failure".into()));
        }
        state
            .claims
            .get(uid)
            .cloned()
            .ok_or_else(|| ClaimsStoreError::UserNotFound(uid.to_owned()))
    }

    async fn set_claims(&self, uid: &str, claims: &ClaimSet) -> Result<(), ClaimsStoreError> {
        let mut state = self.state.lock();
        Self::count(&mut state, uid, |c| c.sets += 1);
        if self.fail_set.contains(uid) {
            return Err(ClaimsStoreError::Status {
                status: 500,
                body: "injected write failure".into(),
            });
        }
        match state.claims.get_mut(uid) {
            Some(slot) => {
                *slot = claims.clone();
                Ok(())
            }
            None => Err(ClaimsStoreError::UserNotFound(uid.to_owned())),
        }
    }

    async fn revoke_sessions(&self, uid: &str) -> Result<(), ClaimsStoreError> {
        let mut state = self.state.lock();
        Self::count(&mut state, uid, |c| c.revokes += 1);
        if self.fail_revoke.contains(uid) {
            return Err(ClaimsStoreError::Transport("injected revoke failure".into()));
        }
        if !state.claims.contains_key(uid) {
            return Err(ClaimsStoreError::UserNotFound(uid.to_owned()));
        }
        *state.revoked.entry(uid.to_owned()).or_default() += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_uid_is_not_found() {
        let store = InMemoryClaimsStore::new();
        let err = store.get_claims("ghost").await.unwrap_err();
        assert!(matches!(err, ClaimsStoreError::UserNotFound(uid) if uid == "ghost"));
        assert_eq!(store.calls_for("ghost").gets, 1);
    }

    #[tokio::test]
    async fn set_replaces_whole_claim_set() {
        let existing = ClaimSet::new().with_claim("tier", serde_json::json!(3));
        let store = InMemoryClaimsStore::new().with_identity("u1", existing);
        store
            .set_claims("u1", &ClaimSet::assignment("S1", "owner"))
            .await
            .unwrap();
        let claims = store.claims("u1").unwrap();
        assert_eq!(claims.store_id(), Some("S1"));
        assert!(claims.get("tier").is_none());
    }

    #[tokio::test]
    async fn injected_failures_are_counted() {
        let store = InMemoryClaimsStore::new()
            .with_identity("u1", ClaimSet::new())
            .failing_set("u1")
            .failing_revoke("u1");
        assert!(store.set_claims("u1", &ClaimSet::new()).await.is_err());
        assert!(store.revoke_sessions("u1").await.is_err());
        assert_eq!(store.revocations("u1"), 0);
        assert_eq!(
            store.total_calls(),
            CallCounts {
                gets: 0,
                sets: 1,
                revokes: 1
            }
        );
    }
}
