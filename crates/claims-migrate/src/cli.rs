use crate::logging::LogFormat;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use claims_core::{ClaimWriteMode, DuplicateOwnerPolicy, MigrationConfig, RunMode};
use claims_firebase::DEFAULT_CREDENTIALS_FILE;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

pub(crate) const ENV_CREDENTIALS: &str = "CLAIMS_MIGRATE_CREDENTIALS";

/// Parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Options {
    pub(crate) credentials: PathBuf,
    pub(crate) mode: RunMode,
    pub(crate) assume_yes: bool,
    pub(crate) write_mode: ClaimWriteMode,
    pub(crate) duplicate_owners: DuplicateOwnerPolicy,
    pub(crate) report_dir: PathBuf,
    pub(crate) log_format: LogFormat,
    pub(crate) timeout: Duration,
}

impl Options {
    pub(crate) fn migration_config(&self) -> MigrationConfig {
        MigrationConfig::new()
            .with_mode(self.mode)
            .with_write_mode(self.write_mode)
            .with_duplicate_owners(self.duplicate_owners)
            .with_report_dir(&self.report_dir)
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        let choice = |id: &str| matches.get_one::<String>(id).map(String::as_str);

        let write_mode = match choice("write-mode") {
            Some("replace") => ClaimWriteMode::Replace,
            _ => ClaimWriteMode::Merge,
        };
        let duplicate_owners = match choice("duplicate-owners") {
            Some("first") => DuplicateOwnerPolicy::FirstSeen,
            Some("last") => DuplicateOwnerPolicy::LastSeen,
            _ => DuplicateOwnerPolicy::Reject,
        };
        let log_format = match choice("log-format") {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Self {
            credentials: matches
                .get_one::<PathBuf>("credentials")
                .cloned()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CREDENTIALS_FILE)),
            mode: if matches.get_flag("apply") {
                RunMode::Apply
            } else {
                RunMode::DryRun
            },
            assume_yes: matches.get_flag("yes"),
            write_mode,
            duplicate_owners,
            report_dir: matches
                .get_one::<PathBuf>("report-dir")
                .cloned()
                .unwrap_or_else(|| PathBuf::from(".")),
            log_format,
            timeout: Duration::from_secs(matches.get_one::<u64>("timeout-secs").copied().unwrap_or(30)),
        }
    }
}

pub(crate) fn command() -> Command {
    Command::new("claims-migrate")
        .version(claims_core::VERSION)
        .about("Back-fill storeId/role custom claims for store owners")
        .arg(
            Arg::new("credentials")
                .long("credentials")
                .env(ENV_CREDENTIALS)
                .default_value(DEFAULT_CREDENTIALS_FILE)
                .value_parser(value_parser!(PathBuf))
                .help("Service account JSON of the Firebase project"),
        )
        .arg(
            Arg::new("apply")
                .long("apply")
                .action(ArgAction::SetTrue)
                .help("Write claims and revoke sessions (default is a dry run)"),
        )
        .arg(
            Arg::new("yes")
                .long("yes")
                .short('y')
                .action(ArgAction::SetTrue)
                .help("Skip the confirmation prompt"),
        )
        .arg(
            Arg::new("write-mode")
                .long("write-mode")
                .default_value("merge")
                .value_parser(["merge", "replace"])
                .help("Merge storeId/role into existing claims, or replace them all"),
        )
        .arg(
            Arg::new("duplicate-owners")
                .long("duplicate-owners")
                .default_value("reject")
                .value_parser(["reject", "first", "last"])
                .help("What to do when two stores share an owner"),
        )
        .arg(
            Arg::new("report-dir")
                .long("report-dir")
                .default_value(".")
                .value_parser(value_parser!(PathBuf))
                .help("Directory receiving the JSON report"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .default_value("text")
                .value_parser(["text", "json"])
                .help("Format of diagnostic logs on stderr"),
        )
        .arg(
            Arg::new("timeout-secs")
                .long("timeout-secs")
                .default_value("30")
                .value_parser(value_parser!(u64).range(1..))
                .help("Per-request timeout against Firebase"),
        )
}

pub(crate) fn parse<I, T>(args: I) -> Result<Options, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = command().try_get_matches_from(args)?;
    Ok(Options::from_matches(&matches))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_to_dry_run() {
        let options = parse(["claims-migrate", "--credentials", "creds.json"]).unwrap();
        assert_eq!(
            options,
            Options {
                credentials: PathBuf::from("creds.json"),
                mode: RunMode::DryRun,
                assume_yes: false,
                write_mode: ClaimWriteMode::Merge,
                duplicate_owners: DuplicateOwnerPolicy::Reject,
                report_dir: PathBuf::from("."),
                log_format: LogFormat::Text,
                timeout: Duration::from_secs(30),
            }
        );
    }

    #[test]
    fn apply_flags() {
        let options = parse([
            "claims-migrate",
            "--apply",
            "-y",
            "--write-mode",
            "replace",
            "--duplicate-owners",
            "last",
            "--report-dir",
            "/var/reports",
            "--log-format",
            "json",
            "--timeout-secs",
            "5",
        ])
        .unwrap();
        assert!(options.mode.is_apply());
        assert!(options.assume_yes);
        assert_eq!(options.write_mode, ClaimWriteMode::Replace);
        assert_eq!(options.duplicate_owners, DuplicateOwnerPolicy::LastSeen);
        assert_eq!(options.log_format, LogFormat::Json);
        assert_eq!(options.timeout, Duration::from_secs(5));

        let config = options.migration_config();
        assert_eq!(config.report_dir, PathBuf::from("/var/reports"));
        assert_eq!(config.duplicate_owners, DuplicateOwnerPolicy::LastSeen);
    }

    #[test]
    fn rejects_unknown_choices() {
        assert!(parse(["claims-migrate", "--write-mode", "append"]).is_err());
        assert!(parse(["claims-migrate", "--timeout-secs", "0"]).is_err());
    }

    #[test]
    fn command_is_well_formed() {
        command().debug_assert();
    }
}
