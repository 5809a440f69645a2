//! Operator-facing narration on stdout

use claims_core::{ClaimSet, MigrationEvent, MigrationObserver, MigrationStatus, RunMode, RunSummary};
use parking_lot::Mutex;
use std::fmt::Write as _;
use std::io::Write;

const RULE: &str = "============================================================";

struct ConsoleState<W> {
    out: W,
    // Per-user notes arrive before the user's resolution.
    pending: Vec<String>,
}

/// Prints one block per user as the run progresses
pub(crate) struct ConsoleObserver<W> {
    state: Mutex<ConsoleState<W>>,
}

impl<W: Write + Send> ConsoleObserver<W> {
    pub(crate) fn new(out: W) -> Self {
        Self {
            state: Mutex::new(ConsoleState {
                out,
                pending: Vec::new(),
            }),
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.state.into_inner().out
    }
}

impl<W: Write + Send> MigrationObserver for ConsoleObserver<W> {
    fn on_event(&self, event: &MigrationEvent) {
        let mut state = self.state.lock();
        let lines = render_event(&mut state.pending, event);
        for line in lines {
            // Narration is best effort; the report is the durable record.
            if writeln!(state.out, "{line}").is_err() {
                break;
            }
        }
        let _ = state.out.flush();
    }
}

fn render_event(pending: &mut Vec<String>, event: &MigrationEvent) -> Vec<String> {
    match event {
        MigrationEvent::IndexBuilt {
            owners,
            skipped,
            collisions,
        } => {
            let mut line = format!("Indexed {owners} store owner(s)");
            if *skipped > 0 {
                let _ = write!(line, ", {skipped} store(s) without owner");
            }
            if *collisions > 0 {
                let _ = write!(line, ", {collisions} duplicate owner(s) resolved");
            }
            vec![line]
        }
        MigrationEvent::UsersListed { count } => vec![format!("Processing {count} user(s)...")],
        MigrationEvent::ClaimsFetchFailed { error, .. } => {
            pending.push(format!("   ! could not read claims ({error}), treating as empty"));
            Vec::new()
        }
        MigrationEvent::ClaimsWriteFailed { error, .. } => {
            pending.push(format!("   ✗ claim write failed: {error}"));
            Vec::new()
        }
        MigrationEvent::SessionsRevoked { .. } => {
            pending.push("   ✓ sessions revoked".to_owned());
            Vec::new()
        }
        MigrationEvent::SessionRevokeFailed { error, .. } => {
            pending.push(format!("   ! session revoke failed: {error}"));
            Vec::new()
        }
        MigrationEvent::UserResolved {
            outcome,
            store_name,
            after,
            applied,
            unmerged,
            ..
        } => {
            let mut lines = vec![
                String::new(),
                format!("User: {}", outcome.email),
                format!("   id: {}", outcome.user_id),
            ];
            let store_id = outcome
                .store_id
                .as_deref()
                .or_else(|| after.as_ref().and_then(ClaimSet::store_id))
                .unwrap_or_default();
            match outcome.status {
                MigrationStatus::AlreadyHasClaims => lines.push(format!(
                    "   = already has claims (storeId={store_id}, role={})",
                    outcome.role.as_deref().unwrap_or("-")
                )),
                MigrationStatus::NoStore => lines.push("   - no store owned".to_owned()),
                MigrationStatus::Migrated | MigrationStatus::Error => {
                    if let Some(name) = store_name {
                        lines.push(format!("   store: {name} ({store_id})"));
                    }
                    if let Some(after) = after {
                        lines.push(format!("   claims: {}", after.to_json_string()));
                    }
                }
            }
            lines.append(pending);
            if *unmerged {
                lines.push("   ! existing claims unreadable, other claims not preserved".to_owned());
            }
            match (outcome.status, *applied) {
                (MigrationStatus::Migrated, true) => lines.push("   ✓ claims written".to_owned()),
                (MigrationStatus::Migrated, false) => {
                    lines.push("   ~ dry run, nothing written".to_owned());
                }
                _ => {}
            }
            lines
        }
        MigrationEvent::Cancelled {
            processed,
            remaining,
        } => vec![
            String::new(),
            format!("Interrupted after {processed} user(s); {remaining} left untouched"),
        ],
        MigrationEvent::Finished { .. } => Vec::new(),
    }
}

/// Closing block printed after the report is written
pub(crate) fn render_summary(summary: &RunSummary, mode: RunMode) -> String {
    let stats = &summary.stats;
    let migrated_label = if mode.is_apply() {
        "Migrated:"
    } else {
        "Would migrate:"
    };

    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "MIGRATION SUMMARY ({})", mode_label(mode));
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "   Total users:          {}", stats.total);
    let _ = writeln!(out, "   {migrated_label:<22}{}", stats.migrated);
    let _ = writeln!(out, "   Already had claims:   {}", stats.already_has_claims);
    let _ = writeln!(out, "   No store:             {}", stats.no_store);
    let _ = writeln!(out, "   Errors:               {}", stats.errors);
    if summary.cancelled {
        let _ = writeln!(out, "   Run was interrupted; totals cover processed users only");
    }
    let _ = writeln!(out);
    if summary.report_location.is_empty() {
        let _ = writeln!(out, "Report NOT written; the lines above are the only record of this run");
    } else {
        let _ = writeln!(out, "Report written to: {}", summary.report_location);
    }
    if mode.is_apply() && stats.migrated > 0 {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "IMPORTANT: migrated users must sign out and sign back in for the new claims to take effect."
        );
    }
    out
}

pub(crate) fn mode_label(mode: RunMode) -> &'static str {
    match mode {
        RunMode::DryRun => "dry run",
        RunMode::Apply => "apply",
    }
}
