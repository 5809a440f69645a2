//! Firestore REST implementation of `DocumentStore`
//!
//! Lists whole collections page by page. Field values arrive in Firestore's
//! typed form (`{"stringValue": "..."}`, `{"mapValue": {"fields": {...}}}`);
//! only the handful of fields the migration reads are decoded.

use crate::credentials::FirebaseSettings;
use crate::error::{CredentialsError, HttpError};
use crate::http::{join, RestClient};
use async_trait::async_trait;
use claims_core::{DocumentStore, DocumentStoreError, StoreRecord, UserRecord};
use serde::Deserialize;
use serde_json::{Map, Value};

const STORES_COLLECTION: &str = "stores";
const USERS_COLLECTION: &str = "users";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<Document>,
    next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

impl Document {
    /// Last segment of `projects/../documents/<collection>/<id>`
    fn id(&self) -> Result<&str, DocumentStoreError> {
        self.name
            .rsplit('/')
            .next()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| DocumentStoreError::Malformed {
                id: self.name.clone(),
                reason: "document name has no id".into(),
            })
    }

    fn string(&self, key: &str) -> Option<String> {
        string_value(self.fields.get(key)?)
    }

    fn nested_string(&self, map_key: &str, key: &str) -> Option<String> {
        let fields = self.fields.get(map_key)?.get("mapValue")?.get("fields")?;
        string_value(fields.get(key)?)
    }
}

fn string_value(value: &Value) -> Option<String> {
    value.get("stringValue")?.as_str().map(str::to_owned)
}

fn decode_store(doc: &Document) -> Result<StoreRecord, DocumentStoreError> {
    Ok(StoreRecord {
        id: doc.id()?.to_owned(),
        owner_id: doc.string("ownerId"),
        display_name: doc.nested_string("basicInfo", "name"),
    })
}

fn decode_user(doc: &Document) -> Result<UserRecord, DocumentStoreError> {
    Ok(UserRecord {
        id: doc.id()?.to_owned(),
        email: doc.string("email"),
    })
}

/// `DocumentStore` over the Firestore REST API
#[derive(Debug, Clone)]
pub struct FirestoreDocumentStore {
    http: RestClient,
    documents_url: String,
    page_size: u32,
}

impl FirestoreDocumentStore {
    /// Client for the project's `(default)` database
    ///
    /// # Errors
    /// The HTTP client could not be built.
    pub fn new(settings: &FirebaseSettings) -> Result<Self, CredentialsError> {
        Ok(Self {
            http: RestClient::new(settings)?,
            documents_url: join(
                &settings.firestore_url,
                &format!(
                    "v1/projects/{}/databases/(default)/documents",
                    settings.project_id
                ),
            ),
            page_size: settings.page_size,
        })
    }

    async fn list_collection(&self, collection: &str) -> Result<Vec<Document>, HttpError> {
        let url = join(&self.documents_url, collection);
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("pageSize", self.page_size.to_string())];
            if let Some(token) = &page_token {
                query.push(("pageToken", token.clone()));
            }
            let page: ListDocumentsResponse = self
                .http
                .request_json(self.http.get(&url).query(&query))
                .await?;

            tracing::debug!(collection, fetched = page.documents.len(), "listed page");
            documents.extend(page.documents);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(documents)
    }
}

#[async_trait]
impl DocumentStore for FirestoreDocumentStore {
    async fn list_stores(&self) -> Result<Vec<StoreRecord>, DocumentStoreError> {
        self.list_collection(STORES_COLLECTION)
            .await?
            .iter()
            .map(decode_store)
            .collect()
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, DocumentStoreError> {
        self.list_collection(USERS_COLLECTION)
            .await?
            .iter()
            .map(decode_user)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn store_document_decodes() {
        let store = decode_store(&doc(json!({
            "name": "projects/p/databases/(default)/documents/stores/S1",
            "fields": {
                "ownerId": {"stringValue": "u1"},
                "basicInfo": {"mapValue": {"fields": {"name": {"stringValue": "Acme"}}}}
            }
        })))
        .unwrap();
        assert_eq!(
            store,
            StoreRecord::new("S1").with_owner("u1").with_name("Acme")
        );
    }

    #[test]
    fn missing_or_null_fields_are_none() {
        let store = decode_store(&doc(json!({
            "name": "projects/p/databases/(default)/documents/stores/S2",
            "fields": {
                "ownerId": {"nullValue": null},
                "basicInfo": {"mapValue": {}}
            }
        })))
        .unwrap();
        assert_eq!(store, StoreRecord::new("S2"));

        let user = decode_user(&doc(json!({
            "name": "projects/p/databases/(default)/documents/users/u9"
        })))
        .unwrap();
        assert_eq!(user, UserRecord::new("u9", None));
    }

    #[test]
    fn empty_document_name_is_malformed() {
        let err = decode_user(&doc(json!({"name": "projects/p/documents/users/"}))).unwrap_err();
        assert!(matches!(err, DocumentStoreError::Malformed { .. }));
    }

    #[test]
    fn empty_collection_response() {
        let page: ListDocumentsResponse = serde_json::from_value(json!({})).unwrap();
        assert!(page.documents.is_empty());
        assert!(page.next_page_token.is_none());
    }
}
