//! HTTP transport shared by every resource client.

use crate::error::ClientError;
use crate::stream::Subscription;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Default buffer of decoded events held between the reader task and the consumer.
const STREAM_CHANNEL_CAPACITY: usize = 64;

/// Admin API client.
///
/// Cheap to clone: the connection pool and the bearer token are shared, so a
/// token stored after login is seen by every resource client handed out earlier.
#[derive(Clone)]
pub struct SecretaryClient {
    client: Client,
    base_url: String,
    timeout: Duration,
    token: Arc<RwLock<Option<SecretString>>>,
}

impl SecretaryClient {
    /// Create a new client for the given backend base URL.
    ///
    /// `timeout` bounds connecting and every plain request. Event streams are
    /// only bounded by the connect timeout since they stay open indefinitely.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder().connect_timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            timeout,
            token: Arc::new(RwLock::new(None)),
        })
    }

    /// Builder-style variant of [`SecretaryClient::set_token`].
    pub fn with_token(self, token: impl Into<String>) -> Self {
        self.set_token(Some(token.into()));
        self
    }

    /// Replace (or clear) the bearer token used for authenticated requests.
    pub fn set_token(&self, token: Option<String>) {
        let mut slot = match self.token.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = token.map(SecretString::new);
    }

    /// Whether a bearer token is configured.
    pub fn has_token(&self) -> bool {
        self.token.read().map(|t| t.is_some()).unwrap_or(false)
    }

    /// Backend base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns true if the backend answers its health endpoint.
    pub async fn health_check(&self) -> bool {
        self.client
            .get(self.url("/health"))
            .timeout(self.timeout)
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.authorized(method, path).timeout(self.timeout)
    }

    fn authorized(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        let token = self.token.read().ok().and_then(|t| t.clone());
        match token {
            Some(token) => builder.header(
                "Authorization",
                format!("Bearer {}", token.expose_secret()),
            ),
            None => builder,
        }
    }

    #[instrument(skip(self))]
    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self.request(Method::GET, path).send().await?;
        self.handle_response(response).await
    }

    #[instrument(skip(self, query))]
    pub(crate) async fn get_query<T, Q>(&self, path: &str, query: &Q) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let response = self.request(Method::GET, path).query(query).send().await?;
        self.handle_response(response).await
    }

    /// GET that maps 404 to `Ok(None)`, for records that may not exist yet.
    #[instrument(skip(self))]
    pub(crate) async fn get_optional<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, ClientError> {
        let response = self.request(Method::GET, path).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("{} not configured yet", path);
            return Ok(None);
        }
        self.handle_response(response).await.map(Some)
    }

    #[instrument(skip(self, body))]
    pub(crate) async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self.request(Method::POST, path).json(body).send().await?;
        self.handle_response(response).await
    }

    #[instrument(skip(self, body))]
    pub(crate) async fn put<T, B>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self.request(Method::PUT, path).json(body).send().await?;
        self.handle_response(response).await
    }

    /// POST whose response body is informational only.
    #[instrument(skip(self, query))]
    pub(crate) async fn post_action<Q>(&self, path: &str, query: &Q) -> Result<(), ClientError>
    where
        Q: Serialize + ?Sized,
    {
        let response = self.request(Method::POST, path).query(query).send().await?;
        self.expect_success(response).await
    }

    #[instrument(skip(self))]
    pub(crate) async fn delete(&self, path: &str) -> Result<(), ClientError> {
        let response = self.request(Method::DELETE, path).send().await?;
        self.expect_success(response).await
    }

    /// Fetch a raw body (exports).
    #[instrument(skip(self, query))]
    pub(crate) async fn get_bytes<Q>(&self, path: &str, query: &Q) -> Result<Vec<u8>, ClientError>
    where
        Q: Serialize + ?Sized,
    {
        let response = self.request(Method::GET, path).query(query).send().await?;
        if !response.status().is_success() {
            return Err(self.extract_error(response).await);
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// Open a server-sent event stream and hand it to a reader task.
    #[instrument(skip(self, body))]
    pub(crate) async fn subscribe(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<Subscription, ClientError> {
        let mut builder = self
            .authorized(method, path)
            .header("Accept", "text/event-stream");
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        let response = builder.send().await?;
        if !response.status().is_success() {
            return Err(self.extract_error(response).await);
        }

        debug!("Opened event stream {}", path);
        Ok(Subscription::spawn(response, STREAM_CHANNEL_CAPACITY))
    }

    /// Handle HTTP response, converting errors appropriately.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            let body = response.text().await?;
            debug!("Response body: {}", truncate(&body, 200));
            serde_json::from_str(&body).map_err(ClientError::from)
        } else {
            Err(self.extract_error(response).await)
        }
    }

    async fn expect_success(&self, response: reqwest::Response) -> Result<(), ClientError> {
        if response.status().is_success() {
            Ok(())
        } else {
            Err(self.extract_error(response).await)
        }
    }

    /// Extract error information from failed response.
    async fn extract_error(&self, response: reqwest::Response) -> ClientError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = backend_message(&body);

        match status {
            StatusCode::UNAUTHORIZED => {
                warn!("Authentication failed");
                ClientError::Unauthorized
            }
            StatusCode::NOT_FOUND => ClientError::NotFound(message),
            _ => {
                warn!("Backend returned {}: {}", status, message);
                ClientError::Api {
                    status: status.as_u16(),
                    message,
                }
            }
        }
    }
}

/// Pull the human-readable message out of an error body.
///
/// The backend answers with `{"detail": ...}`, `{"message": ...}` or
/// `{"error": ...}`; anything else is passed through as text.
fn backend_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for field in ["detail", "message", "error"] {
            match value.get(field) {
                Some(serde_json::Value::String(s)) => return s.clone(),
                Some(other) if !other.is_null() => return other.to_string(),
                _ => {}
            }
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        "Unknown error".into()
    } else {
        trimmed.to_string()
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Percent-encode a single path segment.
pub(crate) fn segment(value: &str) -> std::borrow::Cow<'_, str> {
    urlencoding::encode(value)
}
