//! Testing utilities for the claims migration workspace
//!
//! Shared fixtures, recording observer and in-memory report sink.

#![allow(missing_docs)]

use claims_core::memory::{InMemoryClaimsStore, InMemoryDocumentStore};
use claims_core::{
    ClaimSet, ClaimsMigrator, MigrationConfig, MigrationEvent, MigrationObserver, ReportError,
    ReportSink, RunReport, StoreRecord, UserRecord,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// Collaborators for one test run
#[derive(Debug, Clone)]
pub struct Scenario {
    pub documents: Arc<InMemoryDocumentStore>,
    pub claims: Arc<InMemoryClaimsStore>,
}

impl Scenario {
    pub fn new(documents: InMemoryDocumentStore, claims: InMemoryClaimsStore) -> Self {
        Self {
            documents: Arc::new(documents),
            claims: Arc::new(claims),
        }
    }

    /// Driver over this scenario with a capturing sink and recorder attached
    pub fn migrator(&self, config: MigrationConfig) -> Harness {
        let sink = Arc::new(MemoryReportSink::default());
        let recorder = Arc::new(RecordingObserver::default());
        let migrator = ClaimsMigrator::new(config, self.documents.clone(), self.claims.clone(), sink.clone())
            .unwrap()
            .with_observer(recorder.clone());
        Harness {
            migrator,
            sink,
            recorder,
        }
    }
}

/// Driver plus the sinks it reports into
#[derive(Debug)]
pub struct Harness {
    pub migrator: ClaimsMigrator,
    pub sink: Arc<MemoryReportSink>,
    pub recorder: Arc<RecordingObserver>,
}

/// The reference scenario:
/// - S1 owned by u1 ("Acme"), S2 without owner
/// - u1 (a@x.com) no claims, u2 (b@x.com) already `{storeId: S9, role: owner}`,
///   u3 (c@x.com) no claims and no store
pub fn example_scenario() -> Scenario {
    let documents = InMemoryDocumentStore::new(
        vec![
            StoreRecord::new("S1").with_owner("u1").with_name("Acme"),
            StoreRecord::new("S2").with_name("Orphan"),
        ],
        vec![
            UserRecord::new("u1", Some("a@x.com")),
            UserRecord::new("u2", Some("b@x.com")),
            UserRecord::new("u3", Some("c@x.com")),
        ],
    );
    let claims = InMemoryClaimsStore::new()
        .with_identity("u1", ClaimSet::new())
        .with_identity("u2", ClaimSet::assignment("S9", "owner"))
        .with_identity("u3", ClaimSet::new());
    Scenario::new(documents, claims)
}

/// `count` users, each owning store `S<i>`, none with claims yet
pub fn owners_scenario(count: usize) -> Scenario {
    let stores = (0..count)
        .map(|i| StoreRecord::new(format!("S{i}")).with_owner(format!("u{i}")))
        .collect();
    let users = (0..count)
        .map(|i| UserRecord::new(format!("u{i}"), Some(format!("user{i}@example.com").as_str())))
        .collect();
    let claims = (0..count).fold(InMemoryClaimsStore::new(), |store, i| {
        store.with_identity(format!("u{i}"), ClaimSet::new())
    });
    Scenario::new(InMemoryDocumentStore::new(stores, users), claims)
}

/// Keeps every report handed to it
#[derive(Debug, Default)]
pub struct MemoryReportSink {
    reports: Mutex<Vec<RunReport>>,
}

impl MemoryReportSink {
    pub fn reports(&self) -> Vec<RunReport> {
        self.reports.lock().clone()
    }

    pub fn last(&self) -> Option<RunReport> {
        self.reports.lock().last().cloned()
    }
}

impl ReportSink for MemoryReportSink {
    fn persist(&self, report: &RunReport) -> Result<String, ReportError> {
        let mut reports = self.reports.lock();
        reports.push(report.clone());
        Ok(format!("memory://{}", reports.len()))
    }
}

/// Records every event
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<MigrationEvent>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<MigrationEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, predicate: impl Fn(&MigrationEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }
}

impl MigrationObserver for RecordingObserver {
    fn on_event(&self, event: &MigrationEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Claims carrying one unrelated flag, for merge tests
pub fn claims_with_flag(flag: &str) -> ClaimSet {
    ClaimSet::new().with_claim(flag, serde_json::Value::Bool(true))
}
