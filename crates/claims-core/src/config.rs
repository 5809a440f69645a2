//! Migration configuration
//!
//! Everything the driver needs to know about *how* to run is carried here
//! and handed to `ClaimsMigrator::new`; there is no process-wide state.

use crate::error::MigrationError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Role granted to store owners
pub const DEFAULT_ROLE: &str = "owner";
/// Report file name prefix
pub const DEFAULT_REPORT_PREFIX: &str = "migration_claims";
/// Display name used when a store has none
pub const DEFAULT_STORE_NAME: &str = "Unnamed store";

/// Whether mutations are performed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Resolve outcomes without writing
    #[default]
    DryRun,
    /// Write claims and invalidate sessions
    Apply,
}

impl RunMode {
    /// Whether this mode mutates the claims store
    #[inline]
    #[must_use]
    pub fn is_apply(self) -> bool {
        matches!(self, Self::Apply)
    }
}

/// How the new claims are combined with existing ones
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimWriteMode {
    /// Overlay `storeId`/`role` on the fetched claims
    #[default]
    Merge,
    /// Write only `storeId`/`role`, dropping every other claim
    Replace,
}

/// What to do when two stores share an owner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateOwnerPolicy {
    /// Fail index construction
    #[default]
    Reject,
    /// Keep the first store listed
    FirstSeen,
    /// Keep the last store listed
    LastSeen,
}

/// Migration configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Dry run or apply
    pub mode: RunMode,
    /// Merge or replace claims
    pub write_mode: ClaimWriteMode,
    /// Duplicate owner handling
    pub duplicate_owners: DuplicateOwnerPolicy,
    /// Role written alongside `storeId`
    pub role: String,
    /// Store name placeholder
    pub default_store_name: String,
    /// Directory receiving the report
    pub report_dir: PathBuf,
    /// Report file name prefix
    pub report_prefix: String,
}

impl MigrationConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With run mode
    #[inline]
    #[must_use]
    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    /// With claim write mode
    #[inline]
    #[must_use]
    pub fn with_write_mode(mut self, write_mode: ClaimWriteMode) -> Self {
        self.write_mode = write_mode;
        self
    }

    /// With duplicate owner policy
    #[inline]
    #[must_use]
    pub fn with_duplicate_owners(mut self, policy: DuplicateOwnerPolicy) -> Self {
        self.duplicate_owners = policy;
        self
    }

    /// With report directory
    #[inline]
    #[must_use]
    pub fn with_report_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.report_dir = dir.into();
        self
    }

    /// Check values the driver relies on
    ///
    /// # Errors
    /// `MigrationError::Config` when the role or report prefix is blank.
    pub fn validate(&self) -> Result<(), MigrationError> {
        if self.role.trim().is_empty() {
            return Err(MigrationError::Config("role must not be empty".into()));
        }
        if self.report_prefix.trim().is_empty() {
            return Err(MigrationError::Config("report prefix must not be empty".into()));
        }
        Ok(())
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::default(),
            write_mode: ClaimWriteMode::default(),
            duplicate_owners: DuplicateOwnerPolicy::default(),
            role: DEFAULT_ROLE.to_owned(),
            default_store_name: DEFAULT_STORE_NAME.to_owned(),
            report_dir: PathBuf::from("."),
            report_prefix: DEFAULT_REPORT_PREFIX.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_conservative() {
        let config = MigrationConfig::new();
        assert_eq!(config.mode, RunMode::DryRun);
        assert_eq!(config.write_mode, ClaimWriteMode::Merge);
        assert_eq!(config.duplicate_owners, DuplicateOwnerPolicy::Reject);
        assert_eq!(config.role, "owner");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builders_apply() {
        let config = MigrationConfig::new()
            .with_mode(RunMode::Apply)
            .with_write_mode(ClaimWriteMode::Replace)
            .with_duplicate_owners(DuplicateOwnerPolicy::LastSeen)
            .with_report_dir("/tmp/reports");
        assert!(config.mode.is_apply());
        assert_eq!(config.write_mode, ClaimWriteMode::Replace);
        assert_eq!(config.report_dir, PathBuf::from("/tmp/reports"));
    }

    #[test]
    fn blank_role_rejected() {
        let config = MigrationConfig {
            role: "  ".into(),
            ..MigrationConfig::default()
        };
        assert!(matches!(config.validate(), Err(MigrationError::Config(_))));
    }
}
