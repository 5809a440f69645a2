//! Core types for the claims migration
//!
//! Defines:
//! - Source records read from the document store (`StoreRecord`, `UserRecord`)
//! - The custom claim set held by the identity store (`ClaimSet`)
//! - Per-user outcomes and run statistics

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ulid::Ulid;

/// Claim key carrying the owned store id
pub const STORE_ID_CLAIM: &str = "storeId";
/// Claim key carrying the role
pub const ROLE_CLAIM: &str = "role";
/// Email recorded in outcomes when the user document has none
pub const MISSING_EMAIL: &str = "N/A";

/// Unique run identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(pub Ulid);

impl RunId {
    /// Generate new run ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A document from the `stores` collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreRecord {
    /// Document id, becomes the `storeId` claim
    pub id: String,
    /// Uid of the owning account
    pub owner_id: Option<String>,
    /// `basicInfo.name`
    pub display_name: Option<String>,
}

impl StoreRecord {
    /// Create a store record
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            owner_id: None,
            display_name: None,
        }
    }

    /// With owner uid
    #[must_use]
    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    /// With display name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// A document from the `users` collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Document id, equal to the identity uid
    pub id: String,
    /// Email, if recorded
    pub email: Option<String>,
}

impl UserRecord {
    /// Create a user record
    #[must_use]
    pub fn new(id: impl Into<String>, email: Option<&str>) -> Self {
        Self {
            id: id.into(),
            email: email.map(str::to_owned),
        }
    }

    /// Email as shown in reports
    #[must_use]
    pub fn email_or_placeholder(&self) -> &str {
        self.email.as_deref().unwrap_or(MISSING_EMAIL)
    }
}

/// Custom claims attached to one identity
///
/// Only `storeId` and `role` are interpreted; every other key is carried
/// through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimSet(Map<String, Value>);

impl ClaimSet {
    /// Empty claim set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim set holding exactly `storeId` and `role`
    #[must_use]
    pub fn assignment(store_id: &str, role: &str) -> Self {
        Self::new().with_assignment(store_id, role)
    }

    /// Overlay `storeId` and `role`, keeping every other claim
    #[must_use]
    pub fn with_assignment(mut self, store_id: &str, role: &str) -> Self {
        self.0
            .insert(STORE_ID_CLAIM.to_owned(), Value::String(store_id.to_owned()));
        self.0.insert(ROLE_CLAIM.to_owned(), Value::String(role.to_owned()));
        self
    }

    /// Set an arbitrary claim
    #[must_use]
    pub fn with_claim(mut self, key: impl Into<String>, value: Value) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    /// Parse the JSON object form used by identity backends
    ///
    /// An empty string or `null` is an empty claim set.
    ///
    /// # Errors
    /// Returns the decode error when the text is not a JSON object.
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::new());
        }
        let value: Option<Map<String, Value>> = serde_json::from_str(raw)?;
        Ok(Self(value.unwrap_or_default()))
    }

    /// Compact JSON object text
    #[must_use]
    pub fn to_json_string(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }

    /// Non-empty string `storeId` claim
    #[must_use]
    pub fn store_id(&self) -> Option<&str> {
        self.string_claim(STORE_ID_CLAIM)
    }

    /// Whether `storeId` is set to anything truthy, whatever its type
    #[must_use]
    pub fn has_store_id(&self) -> bool {
        self.0.get(STORE_ID_CLAIM).is_some_and(is_truthy)
    }

    /// Truthy claim as text; strings verbatim, other values as JSON
    #[must_use]
    pub fn claim_text(&self, key: &str) -> Option<String> {
        self.0
            .get(key)
            .filter(|value| is_truthy(value))
            .map(|value| match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
    }

    /// Non-empty string `role` claim
    #[must_use]
    pub fn role(&self) -> Option<&str> {
        self.string_claim(ROLE_CLAIM)
    }

    /// Raw claim value
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Number of claims
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no claims are set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn string_claim(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// `null`, `false`, zero and empty strings/arrays/objects are falsy
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

impl From<Map<String, Value>> for ClaimSet {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Outcome classification for one user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    /// Claims written
    Migrated,
    /// A `storeId` claim was already present
    AlreadyHasClaims,
    /// User owns no store
    NoStore,
    /// Claim write failed
    Error,
}

impl MigrationStatus {
    /// All statuses, in report order
    pub const ALL: [Self; 4] = [
        Self::Migrated,
        Self::AlreadyHasClaims,
        Self::NoStore,
        Self::Error,
    ];

    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Migrated => "migrated",
            Self::AlreadyHasClaims => "already_has_claims",
            Self::NoStore => "no_store",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of processing one user; never mutated after creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationOutcome {
    /// Identity uid
    pub user_id: String,
    /// Email or `N/A`
    pub email: String,
    /// Classification
    pub status: MigrationStatus,
    /// Store id written or already present
    pub store_id: Option<String>,
    /// Role written or already present
    pub role: Option<String>,
}

impl MigrationOutcome {
    fn new(
        user: &UserRecord,
        status: MigrationStatus,
        store_id: Option<&str>,
        role: Option<&str>,
    ) -> Self {
        Self {
            user_id: user.id.clone(),
            email: user.email_or_placeholder().to_owned(),
            status,
            store_id: store_id.map(str::to_owned),
            role: role.map(str::to_owned),
        }
    }

    /// Claims were written
    #[must_use]
    pub fn migrated(user: &UserRecord, store_id: &str, role: &str) -> Self {
        Self::new(user, MigrationStatus::Migrated, Some(store_id), Some(role))
    }

    /// Existing claims echoed back
    #[must_use]
    pub fn already_has_claims(user: &UserRecord, existing: &ClaimSet) -> Self {
        Self::new(
            user,
            MigrationStatus::AlreadyHasClaims,
            existing.claim_text(STORE_ID_CLAIM).as_deref(),
            existing.claim_text(ROLE_CLAIM).as_deref(),
        )
    }

    /// No owned store
    #[must_use]
    pub fn no_store(user: &UserRecord) -> Self {
        Self::new(user, MigrationStatus::NoStore, None, None)
    }

    /// Claim write failed
    #[must_use]
    pub fn error(user: &UserRecord) -> Self {
        Self::new(user, MigrationStatus::Error, None, None)
    }
}

/// Aggregate counts per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Users processed
    pub total: usize,
    /// `migrated`
    pub migrated: usize,
    /// `already_has_claims`
    pub already_has_claims: usize,
    /// `no_store`
    pub no_store: usize,
    /// `error`
    pub errors: usize,
}

impl RunStats {
    /// Count one outcome
    pub fn record(&mut self, status: MigrationStatus) {
        self.total += 1;
        match status {
            MigrationStatus::Migrated => self.migrated += 1,
            MigrationStatus::AlreadyHasClaims => self.already_has_claims += 1,
            MigrationStatus::NoStore => self.no_store += 1,
            MigrationStatus::Error => self.errors += 1,
        }
    }

    /// Recount from a list of outcomes
    #[must_use]
    pub fn from_outcomes<'a>(outcomes: impl IntoIterator<Item = &'a MigrationOutcome>) -> Self {
        let mut stats = Self::default();
        for outcome in outcomes {
            stats.record(outcome.status);
        }
        stats
    }

    /// Count for one status
    #[must_use]
    pub fn count(&self, status: MigrationStatus) -> usize {
        match status {
            MigrationStatus::Migrated => self.migrated,
            MigrationStatus::AlreadyHasClaims => self.already_has_claims,
            MigrationStatus::NoStore => self.no_store,
            MigrationStatus::Error => self.errors,
        }
    }

    /// Per-status counts add up to `total`
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.migrated + self.already_has_claims + self.no_store + self.errors == self.total
    }
}
