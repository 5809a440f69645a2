//! Ownership index: owner uid → owned store
//!
//! Built once per run from the full `stores` listing.

use crate::config::DuplicateOwnerPolicy;
use crate::error::IndexError;
use crate::types::StoreRecord;
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Store owned by one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreInfo {
    /// Store document id
    pub store_id: String,
    /// Display name or placeholder
    pub store_name: String,
}

/// Owner uid → store lookup
#[derive(Debug, Clone, Default)]
pub struct OwnershipIndex {
    by_owner: HashMap<String, StoreInfo>,
    skipped: usize,
    collisions: usize,
}

impl OwnershipIndex {
    /// Index `stores` by owner
    ///
    /// Stores without an owner are skipped. Two stores with one owner are
    /// resolved by `policy`.
    ///
    /// # Errors
    /// `IndexError::DuplicateOwner` under [`DuplicateOwnerPolicy::Reject`].
    pub fn build<'a>(
        stores: impl IntoIterator<Item = &'a StoreRecord>,
        policy: DuplicateOwnerPolicy,
        default_name: &str,
    ) -> Result<Self, IndexError> {
        let mut index = Self::default();

        for store in stores {
            let Some(owner_id) = store.owner_id.as_deref().filter(|o| !o.is_empty()) else {
                index.skipped += 1;
                continue;
            };

            let info = StoreInfo {
                store_id: store.id.clone(),
                store_name: store
                    .display_name
                    .clone()
                    .unwrap_or_else(|| default_name.to_owned()),
            };

            match index.by_owner.entry(owner_id.to_owned()) {
                Entry::Vacant(slot) => {
                    slot.insert(info);
                }
                Entry::Occupied(mut slot) => {
                    let first = slot.get().store_id.clone();
                    if policy == DuplicateOwnerPolicy::Reject {
                        return Err(IndexError::DuplicateOwner {
                            owner_id: owner_id.to_owned(),
                            first,
                            second: info.store_id,
                        });
                    }
                    index.collisions += 1;
                    let kept = if policy == DuplicateOwnerPolicy::LastSeen {
                        slot.insert(info);
                        &slot.get().store_id
                    } else {
                        &first
                    };
                    tracing::warn!(
                        owner_id,
                        first = %first,
                        second = %store.id,
                        kept = %kept,
                        "owner has more than one store"
                    );
                }
            }
        }

        Ok(index)
    }

    /// Store owned by `owner_id`
    #[inline]
    #[must_use]
    pub fn get(&self, owner_id: &str) -> Option<&StoreInfo> {
        self.by_owner.get(owner_id)
    }

    /// Number of indexed owners
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_owner.len()
    }

    /// Whether nothing was indexed
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_owner.is_empty()
    }

    /// Stores skipped for lack of an owner
    #[inline]
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Duplicate owners resolved by policy
    #[inline]
    #[must_use]
    pub fn collisions(&self) -> usize {
        self.collisions
    }
}
