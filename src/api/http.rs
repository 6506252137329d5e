//! reqwest-backed transport

use crate::api::{ApiClient, ApiError, ApiRequest, ApiResponse, Method};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 120;

/// HTTPS client for the VCD administrative API
#[derive(Debug, Clone)]
pub struct HttpApiClient {
    inner: reqwest::Client,
}

impl HttpApiClient {
    /// Build a client, optionally skipping TLS verification for lab setups
    pub fn new(verify_tls: bool) -> Result<Self, ApiError> {
        let inner = reqwest::Client::builder()
            .danger_accept_invalid_certs(!verify_tls)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|err| ApiError::Transport(err.to_string()))?;
        Ok(Self { inner })
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn request(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut builder = match request.method {
            Method::Get => self.inner.get(&request.url),
            Method::Post => self.inner.post(&request.url),
            Method::Put => self.inner.put(&request.url),
            Method::Delete => self.inner.delete(&request.url),
        };

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some((username, password)) = &request.basic_auth {
            builder = builder.basic_auth(username, Some(password));
        }
        if let Some(body) = request.body {
            builder = builder
                .header("Content-Type", "application/json")
                .body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| ApiError::Transport(err.to_string()))?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_lowercase(), v.to_string()))
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|err| ApiError::Transport(err.to_string()))?;

        Ok(ApiResponse {
            status,
            body,
            headers,
        })
    }
}
