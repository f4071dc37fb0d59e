use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use keywarden_config::ApiConfig;
use keywarden_core::ErrorStore;
use keywarden_core::message::server_message;
use reqwest::header::AUTHORIZATION;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::{ClientError, Result};
use crate::types::{Envelope, NewPermission, PermissionRecord, RecordId, RoleRecord, RolePermissions, Session};

/// Admin backend operations used by the repair workflow
#[async_trait]
pub trait AdminApi: Send + Sync {
    /// `GET /admin/permissions`
    async fn list_permissions(&self) -> Result<Vec<PermissionRecord>>;

    /// `POST /admin/permissions`
    async fn create_permission(&self, permission: &NewPermission) -> Result<PermissionRecord>;

    /// `GET /admin/roles`
    async fn list_roles(&self) -> Result<Vec<RoleRecord>>;

    /// `POST /admin/roles/:id/permissions`
    async fn add_permissions_to_role(&self, role_id: &RecordId, permission_ids: &[RecordId]) -> Result<()>;

    /// Re-fetch the current operator and their permissions
    async fn current_session(&self) -> Result<Session>;
}

/// Typed client for the admin backend
#[derive(Clone)]
pub struct AdminClient {
    base_url: Url,
    http: reqwest::Client,
    token: Option<SecretString>,
    session_path: String,
    errors: Option<Arc<dyn ErrorStore>>,
}

impl fmt::Debug for AdminClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminClient")
            .field("base_url", &self.base_url)
            .field("session_path", &self.session_path)
            .field("records_errors", &self.errors.is_some())
            .finish_non_exhaustive()
    }
}

impl AdminClient {
    /// Create a new client pointing at the given base URL
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| ClientError::Config(format!("invalid base URL: {e}")))?;

        Ok(Self {
            base_url,
            http: reqwest::Client::new(),
            token: None,
            session_path: "/auth/me".to_owned(),
            errors: None,
        })
    }

    /// Create a client from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.base_url.clone(),
            http,
            token: config.token.clone(),
            session_path: config.session_path.clone(),
            errors: None,
        })
    }

    /// Set the bearer token
    #[must_use]
    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    /// Record every failed call into `store` before returning the error
    #[must_use]
    pub fn with_error_store(mut self, store: Arc<dyn ErrorStore>) -> Self {
        self.errors = Some(store);
        self
    }

    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Issue an arbitrary call against the backend
    ///
    /// Used for probing endpoints; failures are recorded like any other call.
    pub async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value> {
        self.call(method, path, body).await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T> {
        let url = make_url(&self.base_url, path);

        match self.send(method.clone(), &url, body).await {
            Ok(value) => Ok(value),
            Err(e) => {
                self.capture(&method, &url, &e);
                Err(e)
            }
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: &Url,
        body: Option<&serde_json::Value>,
    ) -> Result<T> {
        tracing::debug!(%method, path = url.path(), "admin request");

        let mut builder = self.http.request(method, url.as_str());
        if let Some(token) = &self.token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token.expose_secret()));
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = handle_error(builder.send().await?).await?;
        let text = response.text().await?;

        // Empty bodies (204, bare 200) decode as JSON null
        let text = if text.trim().is_empty() { "null" } else { text.as_str() };
        serde_json::from_str(text).map_err(|e| ClientError::Parse(e.to_string()))
    }

    fn capture(&self, method: &reqwest::Method, url: &Url, error: &ClientError) {
        let Some(store) = &self.errors else {
            return;
        };

        let event = store.record(error.to_error_input(url.path(), method.as_str()));
        tracing::warn!(
            error_id = %event.id,
            %method,
            path = url.path(),
            status = ?event.status,
            error = %error,
            "admin request failed"
        );
    }
}

#[async_trait]
impl AdminApi for AdminClient {
    async fn list_permissions(&self) -> Result<Vec<PermissionRecord>> {
        let list: Envelope<Vec<PermissionRecord>> = self.call(reqwest::Method::GET, "/admin/permissions", None).await?;
        Ok(list.into_inner())
    }

    async fn create_permission(&self, permission: &NewPermission) -> Result<PermissionRecord> {
        let body = serde_json::to_value(permission).map_err(|e| ClientError::Parse(e.to_string()))?;
        let created: Envelope<PermissionRecord> =
            self.call(reqwest::Method::POST, "/admin/permissions", Some(&body)).await?;
        Ok(created.into_inner())
    }

    async fn list_roles(&self) -> Result<Vec<RoleRecord>> {
        let list: Envelope<Vec<RoleRecord>> = self.call(reqwest::Method::GET, "/admin/roles", None).await?;
        Ok(list.into_inner())
    }

    async fn add_permissions_to_role(&self, role_id: &RecordId, permission_ids: &[RecordId]) -> Result<()> {
        let body = serde_json::to_value(RolePermissions { permission_ids })
            .map_err(|e| ClientError::Parse(e.to_string()))?;
        let path = format!("/admin/roles/{role_id}/permissions");

        let _: serde_json::Value = self.call(reqwest::Method::POST, &path, Some(&body)).await?;
        Ok(())
    }

    async fn current_session(&self) -> Result<Session> {
        let session: Envelope<Session> = self.call(reqwest::Method::GET, &self.session_path, None).await?;
        Ok(session.into_inner())
    }
}

// -- Helper functions --

/// Append `path` to the base URL's own path; a `?query` suffix becomes the query
fn make_url(base_url: &Url, path: &str) -> Url {
    let (path, query) = match path.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path, None),
    };

    let mut url = base_url.clone();
    let joined = format!("{}/{}", base_url.path().trim_end_matches('/'), path.trim_start_matches('/'));
    url.set_path(&joined);
    url.set_query(query);
    url
}

/// Check an HTTP response for errors
async fn handle_error(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();

    Err(ClientError::Api {
        status: status.as_u16(),
        message: server_message(status.as_u16(), &body),
        body,
    })
}
