//! `claims-migrate` - back-fill store ownership into auth custom claims
//!
//! Dry run by default; `--apply` writes claims and invalidates sessions
//! after an interactive confirmation (skipped with `--yes`).
//!
//! Exit status: 0 clean run or declined prompt, 1 fatal error, 2 finished
//! with per-user errors, 130 interrupted.

mod cli;
mod console;
mod logging;
mod prompt;

use anyhow::Context;
use chrono::Local;
use claims_core::{
    CancellationToken, ClaimsMigrator, JsonFileReportSink, MigrationError, RunSummary,
};
use claims_firebase::FirebaseClients;
use console::ConsoleObserver;
use std::io;
use std::process::ExitCode;
use std::sync::Arc;

const EXIT_FATAL: u8 = 1;
const EXIT_RECORD_ERRORS: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

fn main() -> ExitCode {
    let options = match cli::parse(std::env::args_os()) {
        Ok(options) => options,
        Err(err) => err.exit(),
    };
    logging::init(options.log_format);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Fatal: could not start runtime: {err}");
            return ExitCode::from(EXIT_FATAL);
        }
    };

    match runtime.block_on(run(options)) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = ?err, "migration aborted");
            eprintln!("\nFatal: {err:#}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

async fn run(options: cli::Options) -> anyhow::Result<ExitCode> {
    println!("Claims migration ({})", console::mode_label(options.mode));
    println!("Started: {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
    println!("Credentials: {}", options.credentials.display());
    println!();

    let timeout = options.timeout;
    let clients = FirebaseClients::from_credentials_file(&options.credentials, |settings| {
        settings.with_timeout(timeout)
    })
    .await
    .with_context(|| format!("initializing firebase from {}", options.credentials.display()))?;

    if options.mode.is_apply() && !options.assume_yes {
        println!("This will overwrite custom claims and sign affected users out.");
        let proceed = prompt::confirm(io::stdin().lock(), io::stdout()).context("reading confirmation")?;
        if !proceed {
            println!("Migration cancelled; nothing was changed.");
            return Ok(ExitCode::SUCCESS);
        }
    }

    let config = options.migration_config();
    let sink = Arc::new(JsonFileReportSink::from_config(&config));
    let migrator = ClaimsMigrator::new(config, clients.documents, clients.claims, sink)?
        .with_observer(Arc::new(ConsoleObserver::new(io::stdout())));

    let cancel = CancellationToken::new();
    tokio::spawn(watch_interrupts(cancel.clone()));

    let summary = match migrator.run(&cancel).await {
        Ok(summary) => summary,
        Err(MigrationError::ReportNotWritten { source, summary }) => {
            print!("{}", console::render_summary(&summary, options.mode));
            return Err(
                anyhow::Error::new(source).context("run finished but its audit report was not written")
            );
        }
        Err(err) => return Err(err.into()),
    };
    print!("{}", console::render_summary(&summary, options.mode));

    Ok(ExitCode::from(exit_status(&summary)))
}

/// First Ctrl-C stops after the current user; a second one exits at once
async fn watch_interrupts(cancel: CancellationToken) {
    let mut interrupts = 0_u32;
    while tokio::signal::ctrl_c().await.is_ok() {
        interrupts += 1;
        if should_force_exit(interrupts) {
            eprintln!("\nInterrupted again, exiting without waiting for the current request");
            std::process::exit(i32::from(EXIT_INTERRUPTED));
        }
        tracing::warn!("interrupt received, stopping after the current user (Ctrl-C again to force)");
        cancel.cancel();
    }
}

fn should_force_exit(interrupts: u32) -> bool {
    interrupts > 1
}

fn exit_status(summary: &RunSummary) -> u8 {
    if summary.cancelled {
        EXIT_INTERRUPTED
    } else if summary.stats.errors > 0 {
        EXIT_RECORD_ERRORS
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims_core::{RunId, RunStats};

    fn summary(errors: usize, cancelled: bool) -> RunSummary {
        RunSummary {
            run_id: RunId::new(),
            stats: RunStats {
                total: 2,
                migrated: 2 - errors,
                errors,
                ..RunStats::default()
            },
            cancelled,
            report_location: String::new(),
            outcomes: Vec::new(),
        }
    }

    #[test]
    fn second_interrupt_forces_exit() {
        assert!(!should_force_exit(1));
        assert!(should_force_exit(2));
    }

    #[test]
    fn exit_status_reflects_run() {
        assert_eq!(exit_status(&summary(0, false)), 0);
        assert_eq!(exit_status(&summary(1, false)), EXIT_RECORD_ERRORS);
        assert_eq!(exit_status(&summary(1, true)), EXIT_INTERRUPTED);
    }
}
