//! REST client for the field-service API.
//!
//! Each queued mutation becomes one request: POST for creates, PUT for updates
//! and DELETE (no body) for deletes, authorized with a bearer token and scoped
//! to a company through the `x-company-id` header.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::Deserialize;

use fieldsync_core::sync::{
    classify_http_status, DispatchClass, DispatchError, DispatchMethod, DispatchRequest,
    RemoteDispatcher,
};

use crate::error::{RemoteError, Result};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_LOG_BODY_CHARS: usize = 512;

pub const COMPANY_ID_HEADER: &str = "x-company-id";

/// Supplies the credentials attached to every request.
///
/// Read on each dispatch so a refreshed token applies to the next queued item.
pub trait CredentialSource: Send + Sync {
    fn access_token(&self) -> Option<String>;
    fn company_id(&self) -> Option<String>;
}

/// Fixed credentials, typically loaded from configuration at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    pub access_token: Option<String>,
    pub company_id: Option<String>,
}

impl StaticCredentials {
    pub fn new(access_token: Option<String>, company_id: Option<String>) -> Self {
        Self {
            access_token: access_token.filter(|v| !v.trim().is_empty()),
            company_id: company_id.filter(|v| !v.trim().is_empty()),
        }
    }
}

impl CredentialSource for StaticCredentials {
    fn access_token(&self) -> Option<String> {
        self.access_token.clone()
    }

    fn company_id(&self) -> Option<String> {
        self.company_id.clone()
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Delivers [`DispatchRequest`]s over HTTP.
#[derive(Clone)]
pub struct HttpDispatcher {
    client: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialSource>,
}

impl std::fmt::Debug for HttpDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDispatcher")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpDispatcher {
    /// Create a dispatcher rooted at `base_url` (e.g. "https://api.example.com").
    pub fn new(base_url: &str, credentials: Arc<dyn CredentialSource>) -> Result<Self> {
        Self::with_timeout(
            base_url,
            credentials,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
    }

    pub fn with_timeout(
        base_url: &str,
        credentials: Arc<dyn CredentialSource>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute endpoints pass through; relative ones are joined to the base URL.
    fn url(&self, endpoint: &str) -> Result<String> {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return Err(RemoteError::invalid_request("Empty endpoint"));
        }
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return Ok(endpoint.to_string());
        }
        Ok(format!(
            "{}/{}",
            self.base_url,
            endpoint.trim_start_matches('/')
        ))
    }

    fn headers(&self) -> Result<HeaderMap> {
        let token = self
            .credentials
            .access_token()
            .ok_or_else(|| RemoteError::auth("No access token available"))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| RemoteError::auth("Invalid access token format"))?;
        headers.insert(AUTHORIZATION, auth_value);

        if let Some(company_id) = self.credentials.company_id() {
            let company_value = HeaderValue::from_str(&company_id)
                .map_err(|_| RemoteError::auth("Invalid company ID format"))?;
            headers.insert(COMPANY_ID_HEADER, company_value);
        }

        Ok(headers)
    }

    fn method(method: DispatchMethod) -> Method {
        match method {
            DispatchMethod::Post => Method::POST,
            DispatchMethod::Put => Method::PUT,
            DispatchMethod::Delete => Method::DELETE,
        }
    }

    fn build_request(&self, request: &DispatchRequest) -> Result<reqwest::Request> {
        let url = self.url(&request.endpoint)?;
        let mut builder = self
            .client
            .request(Self::method(request.method), &url)
            .headers(self.headers()?);
        if request.method != DispatchMethod::Delete {
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }
        }
        Ok(builder.build()?)
    }

    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("API response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("API response error ({}): {}", status, preview);
    }

    fn error_message(body: &str) -> String {
        if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(body) {
            if let Some(message) = parsed.message.or(parsed.error) {
                return message;
            }
        }
        let preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        format!("Request failed: {}", preview)
    }

    /// Sends one mutation. The response body is only read for error messages.
    pub async fn send(&self, request: &DispatchRequest) -> Result<()> {
        let http_request = self.build_request(request)?;
        debug!(
            "[Remote] {} {} ({})",
            http_request.method(),
            http_request.url(),
            request.entity_type
        );

        let response = self.client.execute(http_request).await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Self::log_response(status, &body);

        match classify_http_status(status.as_u16()) {
            DispatchClass::Success => Ok(()),
            DispatchClass::Conflict | DispatchClass::Retryable => {
                Err(RemoteError::api(status.as_u16(), Self::error_message(&body)))
            }
        }
    }
}

#[async_trait]
impl RemoteDispatcher for HttpDispatcher {
    async fn dispatch(&self, request: DispatchRequest) -> std::result::Result<(), DispatchError> {
        self.send(&request).await.map_err(|err| {
            warn!(
                "[Remote] {} {} failed ({:?}): {}",
                request.method.as_str(),
                request.endpoint,
                err.retry_class(),
                err
            );
            DispatchError::from(err)
        })
    }
}
