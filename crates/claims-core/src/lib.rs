//! Claims Core - store-ownership back-fill for auth custom claims
//!
//! Walks every user account once and makes sure its identity carries the
//! `storeId` / `role` claims that match the store it owns:
//! - Indexes the `stores` collection by owner
//! - Resolves one outcome per user (`migrated`, `already_has_claims`,
//!   `no_store`, `error`)
//! - Invalidates sessions after each write so new claims take effect
//! - Persists a JSON audit report of every outcome
//!
//! # Example
//!
//! ```rust,ignore
//! use claims_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(docs: Arc<dyn DocumentStore>, claims: Arc<dyn ClaimsStore>) -> Result<(), MigrationError> {
//! let config = MigrationConfig::new().with_mode(RunMode::Apply);
//! let sink = Arc::new(JsonFileReportSink::from_config(&config));
//! let migrator = ClaimsMigrator::new(config, docs, claims, sink)?;
//!
//! let summary = migrator.run(&CancellationToken::new()).await?;
//! println!("migrated {} of {}", summary.stats.migrated, summary.stats.total);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod events;
pub mod index;
pub mod memory;
pub mod migrator;
pub mod report;
pub mod store;
pub mod types;

// Re-exports for convenience
pub use tokio_util::sync::CancellationToken;
pub use config::{ClaimWriteMode, DuplicateOwnerPolicy, MigrationConfig, RunMode};
pub use error::{ClaimsStoreError, DocumentStoreError, IndexError, MigrationError, ReportError};
pub use events::{MigrationEvent, MigrationObserver, NoopObserver};
pub use index::{OwnershipIndex, StoreInfo};
pub use migrator::{ClaimsMigrator, RunSummary};
pub use report::{JsonFileReportSink, ReportSink, RunReport};
pub use store::{ClaimsStore, DocumentStore};
pub use types::{
    ClaimSet, MigrationOutcome, MigrationStatus, RunId, RunStats, StoreRecord, UserRecord,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running a migration
    pub use crate::{
        CancellationToken, ClaimSet, ClaimWriteMode, ClaimsMigrator, ClaimsStore, DocumentStore,
        DuplicateOwnerPolicy, JsonFileReportSink, MigrationConfig, MigrationError,
        MigrationEvent, MigrationObserver, MigrationStatus, RunMode, RunSummary,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
