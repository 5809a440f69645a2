//! Structured progress events
//!
//! The driver reports every step to a [`MigrationObserver`] so a host can
//! render progress however it likes. The audit report stays the durable
//! record; events are observational only.

use crate::types::{ClaimSet, MigrationOutcome, RunStats};

/// One step of a migration run
#[derive(Debug, Clone, PartialEq)]
pub enum MigrationEvent {
    /// Ownership index is ready
    IndexBuilt {
        /// Owners indexed
        owners: usize,
        /// Stores without an owner
        skipped: usize,
        /// Duplicate owners resolved by policy
        collisions: usize,
    },

    /// Users listed, processing begins
    UsersListed {
        /// Number of user documents
        count: usize,
    },

    /// Current claims could not be read; treated as empty
    ClaimsFetchFailed {
        /// Identity uid
        user_id: String,
        /// Failure text
        error: String,
    },

    /// The claim write failed
    ClaimsWriteFailed {
        /// Identity uid
        user_id: String,
        /// Failure text
        error: String,
    },

    /// Sessions were invalidated after a write
    SessionsRevoked {
        /// Identity uid
        user_id: String,
    },

    /// Session invalidation failed; outcome unaffected
    SessionRevokeFailed {
        /// Identity uid
        user_id: String,
        /// Failure text
        error: String,
    },

    /// A user has been classified
    UserResolved {
        /// Final outcome
        outcome: MigrationOutcome,
        /// Store display name, when a store was found
        store_name: Option<String>,
        /// Claims before processing
        before: ClaimSet,
        /// Claims written (or that would be written in a dry run)
        after: Option<ClaimSet>,
        /// Whether `after` was actually written
        applied: bool,
        /// Merge mode fell back to an empty base; other claims are not kept
        unmerged: bool,
    },

    /// Cancellation observed; remaining users untouched
    Cancelled {
        /// Users processed before stopping
        processed: usize,
        /// Users left unprocessed
        remaining: usize,
    },

    /// Run over, report pending
    Finished {
        /// Final counts
        stats: RunStats,
    },
}

/// Receives migration events
pub trait MigrationObserver: Send + Sync {
    /// Called synchronously by the driver for every event
    fn on_event(&self, event: &MigrationEvent);
}

impl<F> MigrationObserver for F
where
    F: Fn(&MigrationEvent) + Send + Sync,
{
    fn on_event(&self, event: &MigrationEvent) {
        self(event);
    }
}

/// Observer that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl MigrationObserver for NoopObserver {
    fn on_event(&self, _event: &MigrationEvent) {}
}
