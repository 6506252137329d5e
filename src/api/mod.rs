//! Remote client boundary for the VCD administrative API

pub mod endpoints;
pub mod http;
pub mod session;

pub use http::HttpApiClient;
pub use session::{Credentials, VcdSession};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use thiserror::Error;

/// Error types for the transport layer
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to decode response body: {0}")]
    Decode(String),
}

/// HTTP method subset used by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        };
        write!(f, "{}", name)
    }
}

/// A single request against the remote system
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub basic_auth: Option<(String, String)>,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            basic_auth: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth = Some((username.into(), password.into()));
        self
    }
}

/// A response from the remote system
///
/// Header names are stored lowercased; the pipeline reads the bearer token
/// and task Location headers from here.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
    pub headers: HashMap<String, String>,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            headers: HashMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_lowercase(), value.into());
        self
    }

    /// 2xx status family
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Decode the body as JSON into the requested type
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_str(&self.body).map_err(|err| ApiError::Decode(err.to_string()))
    }

    /// Best-effort extraction of the server-supplied error message
    pub fn error_message(&self) -> String {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&self.body) {
            if let Some(message) = value.get("message").and_then(|m| m.as_str()) {
                return message.to_string();
            }
        }
        let trimmed = self.body.trim();
        if trimmed.is_empty() {
            format!("HTTP {}", self.status)
        } else {
            trimmed.to_string()
        }
    }
}

/// Trait for the remote transport - allows for different implementations
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Perform a single request and return the raw response
    async fn request(&self, request: ApiRequest) -> Result<ApiResponse, ApiError>;
}
