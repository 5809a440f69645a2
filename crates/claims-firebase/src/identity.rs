//! Identity Toolkit REST implementation of `ClaimsStore`
//!
//! - `accounts:lookup` reads `customAttributes` (a JSON string)
//! - `accounts:update` with `customAttributes` replaces the claim set
//! - `accounts:update` with `validSince = now` invalidates sessions

use crate::credentials::FirebaseSettings;
use crate::error::{CredentialsError, HttpError};
use crate::http::{join, RestClient};
use async_trait::async_trait;
use chrono::Utc;
use claims_core::{ClaimSet, ClaimsStore, ClaimsStoreError};
use serde::Deserialize;
use serde_json::json;

/// Serialized custom claims may not exceed this many bytes
pub const MAX_CLAIMS_BYTES: usize = 1000;

/// Claim names the token format reserves
const RESERVED_CLAIMS: &[&str] = &[
    "acr", "amr", "at_hash", "aud", "auth_time", "azp", "cnf", "c_hash", "exp", "firebase", "iat",
    "iss", "jti", "nbf", "nonce", "sub",
];

const USER_NOT_FOUND: &str = "USER_NOT_FOUND";

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    #[serde(default)]
    custom_attributes: Option<String>,
}

/// `ClaimsStore` over the Identity Toolkit REST API
#[derive(Debug, Clone)]
pub struct IdentityToolkitClaimsStore {
    http: RestClient,
    accounts_url: String,
}

impl IdentityToolkitClaimsStore {
    /// Client for the project's accounts
    ///
    /// # Errors
    /// The HTTP client could not be built.
    pub fn new(settings: &FirebaseSettings) -> Result<Self, CredentialsError> {
        Ok(Self {
            http: RestClient::new(settings)?,
            accounts_url: join(
                &settings.identity_url,
                &format!("v1/projects/{}", settings.project_id),
            ),
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/accounts:{method}", self.accounts_url)
    }

    async fn update(&self, uid: &str, body: serde_json::Value) -> Result<(), ClaimsStoreError> {
        self.http
            .request_status_only(self.http.post(&self.endpoint("update")).json(&body))
            .await
            .map_err(|e| not_found_or(uid, e))
    }
}

fn not_found_or(uid: &str, error: HttpError) -> ClaimsStoreError {
    if error.is_code(USER_NOT_FOUND) {
        ClaimsStoreError::UserNotFound(uid.to_owned())
    } else {
        error.into()
    }
}

/// Reject claim sets the identity backend would refuse
fn validate_claims(uid: &str, claims: &ClaimSet) -> Result<String, ClaimsStoreError> {
    if let Some(reserved) = RESERVED_CLAIMS.iter().find(|key| claims.get(key).is_some()) {
        return Err(ClaimsStoreError::InvalidClaims {
            uid: uid.to_owned(),
            reason: format!("claim '{reserved}' is reserved"),
        });
    }
    let encoded = claims.to_json_string();
    if encoded.len() > MAX_CLAIMS_BYTES {
        return Err(ClaimsStoreError::InvalidClaims {
            uid: uid.to_owned(),
            reason: format!("{} bytes exceeds {MAX_CLAIMS_BYTES}", encoded.len()),
        });
    }
    Ok(encoded)
}

#[async_trait]
impl ClaimsStore for IdentityToolkitClaimsStore {
    async fn get_claims(&self, uid: &str) -> Result<ClaimSet, ClaimsStoreError> {
        let request = self
            .http
            .post(&self.endpoint("lookup"))
            .json(&json!({ "localId": [uid] }));
        let response: LookupResponse = self
            .http
            .request_json(request)
            .await
            .map_err(|e| not_found_or(uid, e))?;

        let user = response
            .users
            .into_iter()
            .find(|u| u.local_id == uid)
            .ok_or_else(|| ClaimsStoreError::UserNotFound(uid.to_owned()))?;

        ClaimSet::from_json_str(user.custom_attributes.as_deref().unwrap_or_default()).map_err(|e| {
            ClaimsStoreError::InvalidClaims {
                uid: uid.to_owned(),
                reason: e.to_string(),
            }
        })
    }

    async fn set_claims(&self, uid: &str, claims: &ClaimSet) -> Result<(), ClaimsStoreError> {
        let encoded = validate_claims(uid, claims)?;
        self.update(uid, json!({ "localId": uid, "customAttributes": encoded }))
            .await
    }

    async fn revoke_sessions(&self, uid: &str) -> Result<(), ClaimsStoreError> {
        let valid_since = Utc::now().timestamp().to_string();
        self.update(uid, json!({ "localId": uid, "validSince": valid_since }))
            .await
    }
}
