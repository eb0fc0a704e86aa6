use async_trait::async_trait;
use futures::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::raw::RawArticle;
use crate::config::Config;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024; // 10MB
pub const DEFAULT_LIST_FIELD: &str = "data";

/// Errors that can occur while fetching the upstream article list.
///
/// None of them are retried here; [`FetchError::is_transient`] tells the
/// external trigger whether trying again later is worthwhile.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[source] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request plus body read exceeded the fetch timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// Body was not valid JSON
    #[error("Response is not valid JSON: {0}")]
    Decode(#[source] serde_json::Error),
    /// Body was JSON but not the expected envelope
    #[error("Unexpected response shape: {0}")]
    UnexpectedShape(String),
    /// The API answered with an error object instead of data
    #[error("Upstream API error: {0}")]
    Upstream(String),
    /// Response body exceeded the configured size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// Configured endpoint is not a valid URL
    #[error("Invalid feed endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
}

impl FetchError {
    /// True for faults that a later attempt may not hit again
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Network(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            FetchError::HttpStatus(status) => *status == 429 || *status >= 500,
            FetchError::Timeout(_) | FetchError::IncompleteResponse { .. } => true,
            FetchError::Decode(_)
            | FetchError::UnexpectedShape(_)
            | FetchError::Upstream(_)
            | FetchError::ResponseTooLarge
            | FetchError::InvalidEndpoint(_) => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    /// Strips the request URL so the access key never reaches logs
    fn from(err: reqwest::Error) -> Self {
        FetchError::Network(err.without_url())
    }
}

/// HTTP client for feed fetches: at most 3 redirects, short-lived idle pool
pub fn build_client() -> Result<reqwest::Client, FetchError> {
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::limited(3))
        .user_agent(concat!("newsflow/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(2)
        .pool_idle_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(60))
        .build()?;
    Ok(client)
}

// ============================================================================
// Feed Source
// ============================================================================

/// Anything that can produce one batch of raw upstream articles
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_articles(&self) -> Result<Vec<RawArticle>, FetchError>;
}

/// Fetches the article list from a MediaStack-style JSON endpoint.
///
/// One GET per call, authenticated with an `access_key` query parameter.
#[derive(Debug)]
pub struct HttpFeedSource {
    client: reqwest::Client,
    endpoint: Url,
    access_key: Option<SecretString>,
    params: BTreeMap<String, String>,
    list_field: String,
    timeout: Duration,
    max_response_bytes: usize,
}

impl HttpFeedSource {
    pub fn new(client: reqwest::Client, endpoint: &str) -> Result<Self, FetchError> {
        Ok(Self {
            client,
            endpoint: Url::parse(endpoint)?,
            access_key: None,
            params: BTreeMap::new(),
            list_field: DEFAULT_LIST_FIELD.to_string(),
            timeout: DEFAULT_FETCH_TIMEOUT,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        })
    }

    /// Build a source from the loaded configuration
    pub fn from_config(client: reqwest::Client, config: &Config) -> Result<Self, FetchError> {
        let mut source = Self::new(client, &config.feed_endpoint)?
            .with_params(config.feed_params.clone())
            .with_list_field(config.list_field.clone())
            .with_timeout(config.fetch_timeout())
            .with_max_response_bytes(config.max_response_bytes);
        if let Some(key) = config.access_key() {
            source = source.with_access_key(key);
        }
        Ok(source)
    }

    pub fn with_access_key(mut self, key: SecretString) -> Self {
        self.access_key = Some(key);
        self
    }

    /// Extra query parameters (e.g. `languages`, `categories`, `limit`)
    pub fn with_params(mut self, params: BTreeMap<String, String>) -> Self {
        self.params = params;
        self
    }

    /// Top-level field holding the article list
    pub fn with_list_field(mut self, field: impl Into<String>) -> Self {
        self.list_field = field.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_response_bytes(mut self, limit: usize) -> Self {
        self.max_response_bytes = limit;
        self
    }

    fn request_url(&self) -> Url {
        let mut url = self.endpoint.clone();
        if self.access_key.is_some() || !self.params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            if let Some(key) = &self.access_key {
                pairs.append_pair("access_key", key.expose_secret());
            }
            for (name, value) in &self.params {
                pairs.append_pair(name, value);
            }
        }
        url
    }

    async fn fetch_body(&self) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(self.request_url()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        read_limited_bytes(response, self.max_response_bytes).await
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch_articles(&self) -> Result<Vec<RawArticle>, FetchError> {
        let bytes = tokio::time::timeout(self.timeout, self.fetch_body())
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))??;

        let body: Value = serde_json::from_slice(&bytes).map_err(FetchError::Decode)?;
        let articles = extract_articles(body, &self.list_field)?;

        tracing::debug!(
            endpoint = %self.endpoint,
            bytes = bytes.len(),
            articles = articles.len(),
            "Fetched feed"
        );
        Ok(articles)
    }
}

/// Pull the article list out of the response envelope
fn extract_articles(body: Value, list_field: &str) -> Result<Vec<RawArticle>, FetchError> {
    let Value::Object(mut envelope) = body else {
        return Err(FetchError::UnexpectedShape(
            "top-level value is not an object".to_string(),
        ));
    };

    if let Some(error) = envelope.get("error").filter(|e| !e.is_null()) {
        return Err(FetchError::Upstream(describe_upstream_error(error)));
    }

    match envelope.remove(list_field) {
        None | Some(Value::Null) => {
            tracing::info!(field = %list_field, "Feed response has no article list");
            Ok(Vec::new())
        }
        Some(Value::Array(items)) => Ok(items.into_iter().map(RawArticle::from_value).collect()),
        Some(_) => Err(FetchError::UnexpectedShape(format!(
            "field {list_field:?} is not a list"
        ))),
    }
}

/// `{"code": ..., "message": ...}` → `"code: message"`
fn describe_upstream_error(error: &Value) -> String {
    let code = error.get("code").and_then(Value::as_str);
    let message = error.get("message").and_then(Value::as_str);
    match (code, message) {
        (Some(code), Some(message)) => format!("{code}: {message}"),
        (Some(text), None) | (None, Some(text)) => text.to_string(),
        (None, None) => error.to_string(),
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
