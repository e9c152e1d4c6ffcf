//! Shared HTTP plumbing for the three services
//!
//! Each service answers with a JSON envelope: successful responses wrap the
//! payload under a named key (`{"drivers": [...]}`), failures carry an
//! `error` string. This client unwraps the former and turns the latter into
//! [`Error::Api`].

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::ServicesConfig;
use crate::error::{Error, Result};

/// Error body returned by every service
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// HTTP client bound to one service's base URL
#[derive(Debug, Clone)]
pub struct ServiceClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl ServiceClient {
    /// Build a client for `base_url` with the configured timeout.
    pub fn new(base_url: &str, config: &ServicesConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self::with_http_client(http_client, base_url))
    }

    /// Share an existing connection pool.
    pub fn with_http_client(http_client: reqwest::Client, base_url: &str) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http_client
    }

    /// Join path segments onto the base URL, percent-encoding each one.
    pub fn url(&self, segments: &[&str]) -> String {
        let mut url = self.base_url.clone();
        for segment in segments {
            url.push('/');
            url.push_str(&urlencoding::encode(segment));
        }
        url
    }

    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http_client.request(method, url)
    }

    /// GET and decode the value stored under `key` in the envelope.
    pub async fn get<T: DeserializeOwned>(&self, url: &str, key: &str) -> Result<T> {
        let envelope = self.send(self.request(Method::GET, url)).await?;
        take_field(envelope, key)
    }

    /// POST a JSON body and return the raw envelope.
    pub async fn post<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<serde_json::Value> {
        self.send(self.request(Method::POST, url).json(body)).await
    }

    /// PUT a JSON body and return the raw envelope.
    pub async fn put<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<serde_json::Value> {
        self.send(self.request(Method::PUT, url).json(body)).await
    }

    /// DELETE, optionally with a JSON body (the drivers service wants one).
    pub async fn delete<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: Option<&B>,
    ) -> Result<serde_json::Value> {
        let mut request = self.request(Method::DELETE, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        self.send(request).await
    }

    /// Send a request and return the decoded JSON envelope.
    pub async fn send(&self, request: RequestBuilder) -> Result<serde_json::Value> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::Http(format!("request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Http(format!("failed to read response: {}", e)))?;

        if status.is_success() {
            if text.trim().is_empty() {
                return Ok(serde_json::Value::Null);
            }
            serde_json::from_str(&text)
                .map_err(|e| Error::Http(format!("failed to parse response: {}", e)))
        } else {
            Err(api_error(status.as_u16(), &text))
        }
    }
}

/// Build an [`Error::Api`] from a failed response body.
pub(crate) fn api_error(status: u16, body: &str) -> Error {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .filter(|m| !m.trim().is_empty());
    Error::Api { status, message }
}

/// Pull `key` out of a response envelope.
pub(crate) fn take_field<T: DeserializeOwned>(envelope: serde_json::Value, key: &str) -> Result<T> {
    match envelope {
        serde_json::Value::Object(mut map) => {
            let value = map
                .remove(key)
                .ok_or_else(|| Error::Http(format!("response is missing `{}`", key)))?;
            Ok(serde_json::from_value(value)?)
        }
        other => Err(Error::Http(format!(
            "expected a JSON object with `{}`, got {}",
            key, other
        ))),
    }
}

/// Decode a snapshot one document at a time.
///
/// A document that does not decode is skipped with a warning naming its
/// `key_field`, so one bad record never hides the rest of the collection.
pub(crate) fn decode_each<T: DeserializeOwned>(
    documents: Vec<serde_json::Value>,
    key_field: &str,
) -> Vec<T> {
    documents
        .into_iter()
        .filter_map(|document| {
            let key = document
                .get(key_field)
                .and_then(|v| v.as_str())
                .unwrap_or("<missing>")
                .to_string();
            match serde_json::from_value(document) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(key = %key, field = key_field, error = %e, "Skipping undecodable document");
                    None
                }
            }
        })
        .collect()
}
