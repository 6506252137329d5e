//! Session guard around the remote transport
//!
//! Every authenticated verb probes the session endpoint first and
//! re-authenticates transparently when the probe reports non-success, so a
//! token expiring mid-pipeline never surfaces to the calling step. The
//! extra probe round-trip per call is the accepted cost.

use crate::api::{endpoints, ApiClient, ApiRequest, ApiResponse, Method};
use crate::core::error::PreflightError;
use crate::core::model::CurrentSession;
use tokio::sync::Mutex;
use tracing::debug;

/// Login credentials for the system administrator
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Login name with the system context appended
    fn system_username(&self) -> String {
        format!("{}@system", self.username)
    }
}

/// An authenticated session against one VCD instance
///
/// Owned exclusively by a single pipeline run; the bearer token is replaced
/// in place on re-authentication so queued calls in the same step pick up
/// the fresh session.
pub struct VcdSession<C> {
    client: C,
    endpoint: String,
    credentials: Credentials,
    token: Mutex<Option<String>>,
}

impl<C: ApiClient> VcdSession<C> {
    pub fn new(client: C, endpoint: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            credentials,
            token: Mutex::new(None),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Exchange credentials for a fresh bearer token
    ///
    /// Failure here is fatal for the pipeline; it is never retried.
    pub async fn login(&self) -> Result<(), PreflightError> {
        let request = ApiRequest::new(Method::Post, endpoints::login_url(&self.endpoint))
            .header("Accept", endpoints::VCD_API_ACCEPT)
            .basic_auth(
                self.credentials.system_username(),
                self.credentials.password.clone(),
            );
        let response = self.client.request(request).await?;
        if !response.is_success() {
            return Err(PreflightError::Auth(format!(
                "failed to login to VMware Cloud Director {} with the given credentials",
                self.endpoint
            )));
        }
        let token = response
            .header(endpoints::ACCESS_TOKEN_HEADER)
            .ok_or_else(|| {
                PreflightError::Auth("login response carried no access token".to_string())
            })?;
        *self.token.lock().await = Some(format!("Bearer {}", token));
        debug!("logged in to VMware Cloud Director {}", self.endpoint);
        Ok(())
    }

    /// Probe the current session and re-login when it is no longer valid
    async fn ensure_session(&self) -> Result<(), PreflightError> {
        let token = self.token.lock().await.clone();
        let token = match token {
            Some(token) => token,
            None => return self.login().await,
        };
        let probe = ApiRequest::new(Method::Get, endpoints::session_probe_url(&self.endpoint))
            .header("Authorization", token)
            .header("Accept", endpoints::VCD_API_ACCEPT);
        let response = self.client.request(probe).await?;
        if !response.is_success() {
            debug!("session expired; re-authenticating to {}", self.endpoint);
            return self.login().await;
        }
        Ok(())
    }

    async fn authenticated(&self, request: ApiRequest) -> Result<ApiResponse, PreflightError> {
        self.ensure_session().await?;
        let token = self
            .token
            .lock()
            .await
            .clone()
            .expect("session established by ensure_session");
        let request = request
            .header("Authorization", token)
            .header("Accept", endpoints::VCD_API_ACCEPT);
        Ok(self.client.request(request).await?)
    }

    pub async fn get(&self, url: &str) -> Result<ApiResponse, PreflightError> {
        self.authenticated(ApiRequest::new(Method::Get, url)).await
    }

    pub async fn post(
        &self,
        url: &str,
        body: Option<String>,
    ) -> Result<ApiResponse, PreflightError> {
        let mut request = ApiRequest::new(Method::Post, url);
        if let Some(body) = body {
            request = request.body(body);
        }
        self.authenticated(request).await
    }

    pub async fn put(&self, url: &str, body: String) -> Result<ApiResponse, PreflightError> {
        self.authenticated(ApiRequest::new(Method::Put, url).body(body))
            .await
    }

    pub async fn delete(&self, url: &str) -> Result<ApiResponse, PreflightError> {
        self.authenticated(ApiRequest::new(Method::Delete, url))
            .await
    }

    /// Invalidate the current session at pipeline teardown
    ///
    /// Uses the stored token directly - probing a session we are about to
    /// delete would log us back in.
    pub async fn logout(&self) -> Result<(), PreflightError> {
        let token = match self.token.lock().await.take() {
            Some(token) => token,
            None => return Ok(()),
        };
        debug!("logging out of VMware Cloud Director {}", self.endpoint);
        let lookup = ApiRequest::new(
            Method::Get,
            endpoints::current_session_url(&self.endpoint),
        )
        .header("Authorization", token.clone())
        .header("Accept", "application/json");
        let response = self.client.request(lookup).await?;
        if !response.is_success() {
            return Err(PreflightError::remote(
                "failed to retrieve current session",
                response.error_message(),
            ));
        }
        let session: CurrentSession = response.json().map_err(PreflightError::from)?;
        let delete = ApiRequest::new(
            Method::Delete,
            endpoints::delete_session_url(&self.endpoint, &session.id),
        )
        .header("Authorization", token)
        .header("Accept", "application/json");
        let response = self.client.request(delete).await?;
        if !response.is_success() {
            return Err(PreflightError::remote(
                "failed to log out current user",
                response.error_message(),
            ));
        }
        Ok(())
    }
}
