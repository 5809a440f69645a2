use crate::credentials::FirebaseSettings;
use crate::error::{CredentialsError, HttpError};
use reqwest::{header, Client, RequestBuilder};
use serde::de::DeserializeOwned;

/// Authenticated JSON client shared by both backends
#[derive(Debug, Clone)]
pub(crate) struct RestClient {
    client: Client,
}

impl RestClient {
    pub(crate) fn new(settings: &FirebaseSettings) -> Result<Self, CredentialsError> {
        let mut headers = header::HeaderMap::new();
        let mut bearer = header::HeaderValue::from_str(&format!("Bearer {}", settings.access_token))
            .map_err(|error| CredentialsError::Client(format!("access token is not a valid header: {error}")))?;
        bearer.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, bearer);
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .timeout(settings.timeout)
            .default_headers(headers)
            .build()
            .map_err(|error| CredentialsError::Client(error.to_string()))?;

        Ok(Self { client })
    }

    pub(crate) fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    pub(crate) fn post(&self, url: &str) -> RequestBuilder {
        self.client.post(url)
    }

    pub(crate) async fn request_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, HttpError> {
        let body = self.send(request).await?;
        serde_json::from_str(&body).map_err(|error| HttpError::Decode(error.to_string()))
    }

    pub(crate) async fn request_status_only(&self, request: RequestBuilder) -> Result<(), HttpError> {
        self.send(request).await.map(|_| ())
    }

    async fn send(&self, request: RequestBuilder) -> Result<String, HttpError> {
        let response = request
            .send()
            .await
            .map_err(|error| HttpError::Transport(error.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| HttpError::Transport(format!("response read failed: {error}")))?;

        if status.is_success() {
            Ok(body)
        } else {
            Err(HttpError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}

pub(crate) fn join(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let suffix = path.trim_start_matches('/');
    format!("{base}/{suffix}")
}
