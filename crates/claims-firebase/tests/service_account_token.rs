//! Access tokens minted from a service-account key against a local token endpoint

use claims_firebase::credentials::ENV_ACCESS_TOKEN;
use claims_firebase::{CredentialsError, FirebaseSettings, ServiceCredentials};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};
use warp::http::StatusCode;
use warp::Filter;

const PRIVATE_KEY: &str = include_str!("fixtures/test_service_account.pem");
const PUBLIC_KEY: &str = include_str!("fixtures/test_service_account.pub.pem");
const CLIENT_EMAIL: &str = "migrator@shop-prod.iam.gserviceaccount.com";

#[derive(Clone, Default)]
struct FakeTokenEndpoint {
    assertions: Arc<Mutex<Vec<Value>>>,
    refuse: bool,
}

impl FakeTokenEndpoint {
    fn exchange(&self, form: &HashMap<String, String>, audience: &str) -> (StatusCode, Value) {
        if self.refuse {
            return (StatusCode::BAD_REQUEST, json!({"error": "invalid_grant"}));
        }
        if form.get("grant_type").map(String::as_str)
            != Some("urn:ietf:params:oauth:grant-type:jwt-bearer")
        {
            return (StatusCode::BAD_REQUEST, json!({"error": "unsupported_grant_type"}));
        }
        let Some(assertion) = form.get("assertion") else {
            return (StatusCode::BAD_REQUEST, json!({"error": "invalid_request"}));
        };

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[audience]);
        validation.set_issuer(&[CLIENT_EMAIL]);
        let key = DecodingKey::from_rsa_pem(PUBLIC_KEY.as_bytes()).unwrap();
        match jsonwebtoken::decode::<Value>(assertion, &key, &validation) {
            Ok(data) => {
                self.assertions.lock().unwrap().push(data.claims);
                (
                    StatusCode::OK,
                    json!({"access_token": "minted", "expires_in": 3599, "token_type": "Bearer"}),
                )
            }
            Err(_) => (StatusCode::UNAUTHORIZED, json!({"error": "invalid_grant"})),
        }
    }
}

async fn spawn(fake: FakeTokenEndpoint) -> String {
    let audience = Arc::new(Mutex::new(String::new()));
    let route_audience = Arc::clone(&audience);
    let token = warp::post()
        .and(warp::path("token"))
        .and(warp::body::form::<HashMap<String, String>>())
        .map(move |form: HashMap<String, String>| {
            let audience = route_audience.lock().unwrap().clone();
            let (status, body) = fake.exchange(&form, &audience);
            warp::reply::with_status(warp::reply::json(&body), status)
        });
    let (addr, server) = warp::serve(token).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);

    let uri = format!("http://{addr}/token");
    audience.lock().unwrap().clone_from(&uri);
    uri
}

fn service_account(token_uri: &str) -> ServiceCredentials {
    ServiceCredentials {
        project_id: "shop-prod".into(),
        client_email: Some(CLIENT_EMAIL.into()),
        private_key: Some(PRIVATE_KEY.into()),
        private_key_id: Some("test-key".into()),
        token_uri: Some(token_uri.into()),
        ..ServiceCredentials::default()
    }
}

#[tokio::test]
async fn key_file_without_token_mints_one() {
    let fake = FakeTokenEndpoint::default();
    let token_uri = spawn(fake.clone()).await;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    let key_file = json!({
        "type": "service_account",
        "project_id": "shop-prod",
        "client_email": CLIENT_EMAIL,
        "private_key": PRIVATE_KEY,
        "private_key_id": "test-key",
        "token_uri": token_uri,
    });
    write!(file, "{key_file}").unwrap();
    let credentials = ServiceCredentials::load(file.path()).unwrap();
    assert_eq!(credentials.access_token, None);

    let settings = FirebaseSettings::resolve(&credentials, |_| None).await.unwrap();
    assert_eq!(settings.access_token, "minted");
    assert_eq!(settings.project_id, "shop-prod");

    let assertions = fake.assertions.lock().unwrap();
    assert_eq!(assertions.len(), 1);
    let claims = &assertions[0];
    assert_eq!(claims["iss"], CLIENT_EMAIL);
    assert!(claims["scope"].as_str().unwrap().contains("identitytoolkit"));
    let lifetime = claims["exp"].as_i64().unwrap() - claims["iat"].as_i64().unwrap();
    assert_eq!(lifetime, 3600);
}

#[tokio::test]
async fn explicit_token_skips_exchange() {
    let fake = FakeTokenEndpoint::default();
    let token_uri = spawn(fake.clone()).await;

    let credentials = service_account(&token_uri);
    let settings = FirebaseSettings::resolve(&credentials, |key| {
        (key == ENV_ACCESS_TOKEN).then(|| "from-env".to_owned())
    })
    .await
    .unwrap();

    assert_eq!(settings.access_token, "from-env");
    assert!(fake.assertions.lock().unwrap().is_empty());
}

#[tokio::test]
async fn refused_exchange_is_an_error() {
    let fake = FakeTokenEndpoint {
        refuse: true,
        ..FakeTokenEndpoint::default()
    };
    let token_uri = spawn(fake).await;

    let err = FirebaseSettings::resolve(&service_account(&token_uri), |_| None)
        .await
        .unwrap_err();
    match err {
        CredentialsError::TokenExchange(message) => assert!(message.contains("invalid_grant")),
        other => panic!("expected a token exchange error, got {other:?}"),
    }
}
