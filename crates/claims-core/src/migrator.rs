//! Migration driver
//!
//! Single sequential pass:
//! 1. Build the ownership index from `stores`
//! 2. List `users`
//! 3. Resolve one outcome per user, checking for cancellation in between
//! 4. Persist the audit report
//!
//! Collaborator failures inside step 3 only ever degrade the outcome of the
//! user being processed. Failures in steps 1 and 2 abort the run; a failure
//! in step 4 is returned with the finished summary attached.

use crate::config::{ClaimWriteMode, MigrationConfig};
use crate::error::MigrationError;
use crate::events::{MigrationEvent, MigrationObserver, NoopObserver};
use crate::index::OwnershipIndex;
use crate::report::{ReportSink, RunReport};
use crate::store::{ClaimsStore, DocumentStore};
use crate::types::{ClaimSet, MigrationOutcome, RunId, RunStats, UserRecord};
use chrono::Local;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// What a finished (or cancelled) run produced
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Run identifier
    pub run_id: RunId,
    /// Counts per status
    pub stats: RunStats,
    /// Stopped early by cancellation
    pub cancelled: bool,
    /// Where the report was persisted
    pub report_location: String,
    /// Outcomes in processing order
    pub outcomes: Vec<MigrationOutcome>,
}

/// Drives one migration run
pub struct ClaimsMigrator {
    config: MigrationConfig,
    documents: Arc<dyn DocumentStore>,
    claims: Arc<dyn ClaimsStore>,
    sink: Arc<dyn ReportSink>,
    observer: Arc<dyn MigrationObserver>,
}

impl std::fmt::Debug for ClaimsMigrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimsMigrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ClaimsMigrator {
    /// Create a driver over explicit collaborators
    ///
    /// # Errors
    /// `MigrationError::Config` when `config` fails validation.
    pub fn new(
        config: MigrationConfig,
        documents: Arc<dyn DocumentStore>,
        claims: Arc<dyn ClaimsStore>,
        sink: Arc<dyn ReportSink>,
    ) -> Result<Self, MigrationError> {
        config.validate()?;
        Ok(Self {
            config,
            documents,
            claims,
            sink,
            observer: Arc::new(NoopObserver),
        })
    }

    /// Route progress events to `observer`
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn MigrationObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Load every store and index it by owner
    ///
    /// # Errors
    /// Listing failure, or a duplicate owner under the `Reject` policy.
    pub async fn build_index(&self) -> Result<OwnershipIndex, MigrationError> {
        tracing::info!("loading stores");
        let stores = self
            .documents
            .list_stores()
            .await
            .map_err(|e| MigrationError::listing("stores", e))?;

        let index = OwnershipIndex::build(
            &stores,
            self.config.duplicate_owners,
            &self.config.default_store_name,
        )?;

        tracing::info!(
            stores = stores.len(),
            owners = index.len(),
            skipped = index.skipped(),
            "ownership index built"
        );
        self.emit(MigrationEvent::IndexBuilt {
            owners: index.len(),
            skipped: index.skipped(),
            collisions: index.collisions(),
        });
        Ok(index)
    }

    /// Decide and apply the outcome for one user
    ///
    /// Never fails: every collaborator error is folded into the outcome.
    pub async fn resolve_user(&self, user: &UserRecord, index: &OwnershipIndex) -> MigrationOutcome {
        let uid = user.id.as_str();
        tracing::debug!(uid, email = user.email_or_placeholder(), "processing user");

        let mut fetch_failed = false;
        let before = match self.claims.get_claims(uid).await {
            Ok(claims) => claims,
            Err(e) => {
                fetch_failed = true;
                tracing::warn!(uid, error = %e, "could not read current claims, treating as empty");
                self.emit(MigrationEvent::ClaimsFetchFailed {
                    user_id: uid.to_owned(),
                    error: e.to_string(),
                });
                ClaimSet::new()
            }
        };

        if before.has_store_id() {
            let outcome = MigrationOutcome::already_has_claims(user, &before);
            return self.resolved(outcome, None, before, None, false, false);
        }

        let Some(store) = index.get(uid) else {
            return self.resolved(MigrationOutcome::no_store(user), None, before, None, false, false);
        };

        let role = self.config.role.as_str();
        let after = match self.config.write_mode {
            ClaimWriteMode::Merge => before.clone().with_assignment(&store.store_id, role),
            ClaimWriteMode::Replace => ClaimSet::assignment(&store.store_id, role),
        };
        let store_name = Some(store.store_name.clone());
        // Merge had nothing to merge with; other claims will not survive the write.
        let unmerged = fetch_failed && self.config.write_mode == ClaimWriteMode::Merge;

        if !self.config.mode.is_apply() {
            let outcome = MigrationOutcome::migrated(user, &store.store_id, role);
            return self.resolved(outcome, store_name, before, Some(after), false, unmerged);
        }

        if unmerged {
            tracing::warn!(uid, "writing claims without merging, existing claims were unreadable");
        }

        if let Err(e) = self.claims.set_claims(uid, &after).await {
            tracing::error!(uid, store_id = %store.store_id, error = %e, "claim write failed");
            self.emit(MigrationEvent::ClaimsWriteFailed {
                user_id: uid.to_owned(),
                error: e.to_string(),
            });
            return self.resolved(
                MigrationOutcome::error(user),
                store_name,
                before,
                Some(after),
                false,
                unmerged,
            );
        }

        match self.claims.revoke_sessions(uid).await {
            Ok(()) => self.emit(MigrationEvent::SessionsRevoked {
                user_id: uid.to_owned(),
            }),
            Err(e) => {
                tracing::warn!(uid, error = %e, "session revocation failed");
                self.emit(MigrationEvent::SessionRevokeFailed {
                    user_id: uid.to_owned(),
                    error: e.to_string(),
                });
            }
        }

        let outcome = MigrationOutcome::migrated(user, &store.store_id, role);
        self.resolved(outcome, store_name, before, Some(after), true, unmerged)
    }

    /// Run the whole migration
    ///
    /// `cancel` is checked before every user; once set, the remaining users
    /// are left untouched and the partial report is flagged as cancelled.
    ///
    /// # Errors
    /// Listing failures, index rejection, or report persistence failure.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<RunSummary, MigrationError> {
        let run_id = RunId::new();
        let started = Local::now();
        tracing::info!(run_id = %run_id, mode = ?self.config.mode, write_mode = ?self.config.write_mode, "migration started");

        let index = self.build_index().await?;

        let users = self
            .documents
            .list_users()
            .await
            .map_err(|e| MigrationError::listing("users", e))?;
        tracing::info!(users = users.len(), "processing users");
        self.emit(MigrationEvent::UsersListed { count: users.len() });

        let mut stats = RunStats::default();
        let mut outcomes = Vec::with_capacity(users.len());
        let mut cancelled = false;

        for (processed, user) in users.iter().enumerate() {
            if cancel.is_cancelled() {
                let remaining = users.len() - processed;
                tracing::warn!(processed, remaining, "migration cancelled");
                self.emit(MigrationEvent::Cancelled { processed, remaining });
                cancelled = true;
                break;
            }

            let outcome = self.resolve_user(user, &index).await;
            stats.record(outcome.status);
            outcomes.push(outcome);
        }

        tracing::info!(
            total = stats.total,
            migrated = stats.migrated,
            already_has_claims = stats.already_has_claims,
            no_store = stats.no_store,
            errors = stats.errors,
            cancelled,
            "migration finished"
        );
        self.emit(MigrationEvent::Finished { stats });

        let report = RunReport::new(run_id, started, self.config.mode, cancelled, outcomes);
        debug_assert_eq!(report.stats, stats);
        let persisted = self.sink.persist(&report);

        let mut summary = RunSummary {
            run_id,
            stats,
            cancelled,
            report_location: String::new(),
            outcomes: report.results,
        };
        match persisted {
            Ok(location) => {
                summary.report_location = location;
                Ok(summary)
            }
            Err(source) => {
                tracing::error!(run_id = %run_id, error = %source, "report could not be persisted");
                Err(MigrationError::ReportNotWritten {
                    source,
                    summary: Box::new(summary),
                })
            }
        }
    }

    fn resolved(
        &self,
        outcome: MigrationOutcome,
        store_name: Option<String>,
        before: ClaimSet,
        after: Option<ClaimSet>,
        applied: bool,
        unmerged: bool,
    ) -> MigrationOutcome {
        tracing::debug!(uid = %outcome.user_id, status = %outcome.status, applied, "user resolved");
        self.emit(MigrationEvent::UserResolved {
            outcome: outcome.clone(),
            store_name,
            before,
            after,
            applied,
            unmerged,
        });
        outcome
    }

    fn emit(&self, event: MigrationEvent) {
        self.observer.on_event(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunMode;
    use crate::error::{ClaimsStoreError, ReportError};
    use crate::memory::{InMemoryClaimsStore, InMemoryDocumentStore};
    use crate::store::MockClaimsStore;
    use crate::types::{MigrationStatus, StoreRecord};
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct CapturingSink(Mutex<Vec<RunReport>>);

    impl ReportSink for CapturingSink {
        fn persist(&self, report: &RunReport) -> Result<String, ReportError> {
            self.0.lock().push(report.clone());
            Ok("memory".into())
        }
    }

    fn documents() -> Arc<InMemoryDocumentStore> {
        Arc::new(InMemoryDocumentStore::new(
            vec![StoreRecord::new("S1").with_owner("u1").with_name("Acme")],
            vec![UserRecord::new("u1", Some("a@x.com"))],
        ))
    }

    fn apply() -> MigrationConfig {
        MigrationConfig::new().with_mode(RunMode::Apply)
    }

    #[tokio::test]
    async fn existing_store_id_short_circuits_without_writes() {
        let mut mock = MockClaimsStore::new();
        mock.expect_get_claims()
            .times(1)
            .returning(|_| Ok(ClaimSet::assignment("S9", "owner")));
        mock.expect_set_claims().never();
        mock.expect_revoke_sessions().never();

        let migrator = ClaimsMigrator::new(
            apply(),
            documents(),
            Arc::new(mock),
            Arc::new(CapturingSink::default()),
        )
        .unwrap();
        let index = migrator.build_index().await.unwrap();

        let outcome = migrator
            .resolve_user(&UserRecord::new("u1", Some("a@x.com")), &index)
            .await;
        assert_eq!(outcome.status, MigrationStatus::AlreadyHasClaims);
        assert_eq!(outcome.store_id.as_deref(), Some("S9"));
        assert_eq!(outcome.role.as_deref(), Some("owner"));
    }

    #[tokio::test]
    async fn numeric_store_id_counts_as_present() {
        let mut mock = MockClaimsStore::new();
        mock.expect_get_claims().times(1).returning(|_| {
            Ok(ClaimSet::new()
                .with_claim("storeId", json!(42))
                .with_claim("role", json!("admin")))
        });
        mock.expect_set_claims().never();
        mock.expect_revoke_sessions().never();

        let migrator = ClaimsMigrator::new(
            apply(),
            documents(),
            Arc::new(mock),
            Arc::new(CapturingSink::default()),
        )
        .unwrap();
        let index = migrator.build_index().await.unwrap();

        let outcome = migrator
            .resolve_user(&UserRecord::new("u1", Some("a@x.com")), &index)
            .await;
        assert_eq!(outcome.status, MigrationStatus::AlreadyHasClaims);
        assert_eq!(outcome.store_id.as_deref(), Some("42"));
        assert_eq!(outcome.role.as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn unreadable_claims_flag_unmerged_write() {
        let claims = Arc::new(
            InMemoryClaimsStore::new()
                .with_identity("u1", ClaimSet::new().with_claim("beta", json!(true)))
                .failing_get("u1"),
        );
        let events = Arc::new(Mutex::new(Vec::new()));
        let seen = events.clone();
        let migrator = ClaimsMigrator::new(
            apply(),
            documents(),
            claims.clone(),
            Arc::new(CapturingSink::default()),
        )
        .unwrap()
        .with_observer(Arc::new(move |e: &MigrationEvent| seen.lock().push(e.clone())));
        let index = migrator.build_index().await.unwrap();

        let outcome = migrator
            .resolve_user(&UserRecord::new("u1", None), &index)
            .await;
        assert_eq!(outcome.status, MigrationStatus::Migrated);
        assert_eq!(claims.claims("u1"), Some(ClaimSet::assignment("S1", "owner")));
        assert!(events.lock().iter().any(|e| matches!(
            e,
            MigrationEvent::UserResolved { unmerged: true, applied: true, .. }
        )));
    }

    #[tokio::test]
    async fn report_failure_keeps_summary() {
        struct RefusingSink;
        impl ReportSink for RefusingSink {
            fn persist(&self, _report: &RunReport) -> Result<String, ReportError> {
                Err(ReportError::AlreadyExists("taken.json".into()))
            }
        }

        let claims = Arc::new(InMemoryClaimsStore::new().with_identity("u1", ClaimSet::new()));
        let migrator =
            ClaimsMigrator::new(apply(), documents(), claims.clone(), Arc::new(RefusingSink)).unwrap();

        let err = migrator.run(&CancellationToken::new()).await.unwrap_err();
        let summary = match err {
            MigrationError::ReportNotWritten { summary, .. } => summary,
            other => panic!("expected ReportNotWritten, got {other:?}"),
        };
        assert_eq!(summary.stats.migrated, 1);
        assert_eq!(summary.outcomes[0].user_id, "u1");
        assert!(summary.report_location.is_empty());
        assert_eq!(claims.revocations("u1"), 1);
    }

    #[tokio::test]
    async fn write_failure_skips_revocation() {
        let mut mock = MockClaimsStore::new();
        mock.expect_get_claims()
            .returning(|uid| Err(ClaimsStoreError::UserNotFound(uid.to_owned())));
        mock.expect_set_claims()
            .times(1)
            .returning(|_, _| Err(ClaimsStoreError::Transport("reset".into())));
        mock.expect_revoke_sessions().never();

        let migrator = ClaimsMigrator::new(
            apply(),
            documents(),
            Arc::new(mock),
            Arc::new(CapturingSink::default()),
        )
        .unwrap();
        let index = migrator.build_index().await.unwrap();

        let outcome = migrator
            .resolve_user(&UserRecord::new("u1", None), &index)
            .await;
        assert_eq!(outcome.status, MigrationStatus::Error);
        assert_eq!(outcome.store_id, None);
        assert_eq!(outcome.email, "N/A");
    }

    #[tokio::test]
    async fn revocation_failure_keeps_migrated() {
        let claims = Arc::new(
            InMemoryClaimsStore::new()
                .with_identity("u1", ClaimSet::new())
                .failing_revoke("u1"),
        );
        let migrator = ClaimsMigrator::new(
            apply(),
            documents(),
            claims.clone(),
            Arc::new(CapturingSink::default()),
        )
        .unwrap();
        let index = migrator.build_index().await.unwrap();

        let outcome = migrator
            .resolve_user(&UserRecord::new("u1", None), &index)
            .await;
        assert_eq!(outcome.status, MigrationStatus::Migrated);
        assert_eq!(claims.calls_for("u1").revokes, 1);
        assert_eq!(claims.revocations("u1"), 0);
    }

    #[tokio::test]
    async fn merge_preserves_unrelated_claims() {
        let existing = ClaimSet::new().with_claim("beta", json!(true));
        let claims = Arc::new(InMemoryClaimsStore::new().with_identity("u1", existing));
        let migrator = ClaimsMigrator::new(
            apply(),
            documents(),
            claims.clone(),
            Arc::new(CapturingSink::default()),
        )
        .unwrap();
        let index = migrator.build_index().await.unwrap();
        migrator
            .resolve_user(&UserRecord::new("u1", None), &index)
            .await;

        let stored = claims.claims("u1").unwrap();
        assert_eq!(stored.store_id(), Some("S1"));
        assert_eq!(stored.get("beta"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn replace_drops_unrelated_claims() {
        let existing = ClaimSet::new().with_claim("beta", json!(true));
        let claims = Arc::new(InMemoryClaimsStore::new().with_identity("u1", existing));
        let config = apply().with_write_mode(ClaimWriteMode::Replace);
        let migrator = ClaimsMigrator::new(
            config,
            documents(),
            claims.clone(),
            Arc::new(CapturingSink::default()),
        )
        .unwrap();
        let index = migrator.build_index().await.unwrap();
        migrator
            .resolve_user(&UserRecord::new("u1", None), &index)
            .await;

        assert_eq!(claims.claims("u1"), Some(ClaimSet::assignment("S1", "owner")));
    }

    #[tokio::test]
    async fn dry_run_reports_without_mutating() {
        let claims = Arc::new(InMemoryClaimsStore::new().with_identity("u1", ClaimSet::new()));
        let sink = Arc::new(CapturingSink::default());
        let migrator =
            ClaimsMigrator::new(MigrationConfig::new(), documents(), claims.clone(), sink.clone())
                .unwrap();

        let summary = migrator.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(summary.stats.migrated, 1);
        assert_eq!(claims.total_calls().sets, 0);
        assert_eq!(claims.total_calls().revokes, 0);
        assert_eq!(sink.0.lock()[0].mode, RunMode::DryRun);
    }

    #[tokio::test]
    async fn observer_sees_before_and_after() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let seen = events.clone();
        let claims = Arc::new(InMemoryClaimsStore::new().with_identity("u1", ClaimSet::new()));
        let migrator = ClaimsMigrator::new(
            apply(),
            documents(),
            claims,
            Arc::new(CapturingSink::default()),
        )
        .unwrap()
        .with_observer(Arc::new(move |e: &MigrationEvent| seen.lock().push(e.clone())));

        migrator.run(&CancellationToken::new()).await.unwrap();

        let events = events.lock();
        let resolved = events
            .iter()
            .find_map(|e| match e {
                MigrationEvent::UserResolved {
                    after,
                    applied,
                    store_name,
                    ..
                } => Some((after.clone(), *applied, store_name.clone())),
                _ => None,
            })
            .unwrap();
        assert_eq!(resolved.0, Some(ClaimSet::assignment("S1", "owner")));
        assert!(resolved.1);
        assert_eq!(resolved.2.as_deref(), Some("Acme"));
        assert!(events
            .iter()
            .any(|e| matches!(e, MigrationEvent::SessionsRevoked { user_id } if user_id == "u1")));
        assert!(matches!(events.last(), Some(MigrationEvent::Finished { .. })));
    }
}
