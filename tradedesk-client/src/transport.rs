//! HTTP transport seam.
//!
//! The [`Transport`] trait abstracts the wire so the API layer and editor can
//! run against the real backend ([`HttpTransport`]) or a scripted one in
//! tests ([`crate::testing::ScriptedTransport`]).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::error::TransportError;
use crate::session::TokenStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        };
        f.write_str(s)
    }
}

/// A request relative to the API base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self { method: Method::Get, path: path.into(), body: None }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self { method: Method::Post, path: path.into(), body: Some(body) }
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self { method: Method::Put, path: path.into(), body: Some(body) }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self { method: Method::Delete, path: path.into(), body: None }
    }
}

/// Status plus decoded JSON body (absent when the body was empty).
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Option<Value>,
}

impl ApiResponse {
    pub fn new(status: u16, body: Option<Value>) -> Self {
        Self { status, body }
    }

    pub fn ok(body: Value) -> Self {
        Self::new(200, Some(body))
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one request and returns whatever status came back.
///
/// Implementations report non-2xx statuses as `Ok`; `Err` is reserved for
/// requests that produced no response at all.
pub trait Transport: Send + Sync {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// Blocking reqwest transport with bearer-token auth.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
    base_url: String,
    tokens: Arc<TokenStore>,
}

impl HttpTransport {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        tokens: Arc<TokenStore>,
    ) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.url(&request.path);
        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
            Method::Delete => self.client.delete(&url),
        };
        if let Some(token) = self.tokens.get() {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let resp = builder.send().map_err(|e| {
            if e.is_connect() {
                TransportError::Connect(e.to_string())
            } else if e.is_timeout() {
                TransportError::Timeout(e.to_string())
            } else {
                TransportError::Request(e.to_string())
            }
        })?;

        let status = resp.status().as_u16();
        let text = resp.text().map_err(|e| TransportError::Body(e.to_string()))?;
        debug!(method = %request.method, %url, status, "response received");

        let body = if text.trim().is_empty() {
            None
        } else {
            match serde_json::from_str::<Value>(&text) {
                Ok(v) => Some(v),
                // Error pages are often plain text; keep them as the message.
                Err(_) if !(200..300).contains(&status) => {
                    Some(serde_json::json!({ "message": text }))
                }
                Err(e) => {
                    return Err(TransportError::Body(format!(
                        "invalid JSON from {url}: {e}"
                    )))
                }
            }
        };

        Ok(ApiResponse { status, body })
    }
}
