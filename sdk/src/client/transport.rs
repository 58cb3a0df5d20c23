//! HTTP transport with request and error hooks.
//!
//! Every request passes through the registered [`RequestHook`]s in order
//! before it is sent; the first hook is always [`AuthHook`], which sets the
//! `Authorization` header from the configured [`AuthProvider`]. Failed
//! responses are turned into [`SdkError::Problem`] when the body is an
//! RFC 7807 document, then handed to each hook's `before_error`.

use crate::config::ClientConfig;
use crate::error::{ProblemDetail, Result, SdkError};
use async_trait::async_trait;
use camunda_core::{Audience, AuthProvider};
use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::{Method, Request};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Hook around every REST call
#[async_trait]
pub trait RequestHook: Send + Sync {
    /// Inspect or amend the request before it is sent.
    async fn before_request(&self, request: &mut Request) -> Result<()> {
        let _ = request;
        Ok(())
    }

    /// Replace or enrich the error of a failed call.
    async fn before_error(&self, error: SdkError) -> SdkError {
        error
    }
}

/// Adds the provider's authorization headers for one audience.
pub struct AuthHook {
    auth: Arc<dyn AuthProvider>,
    audience: Audience,
}

impl AuthHook {
    pub fn new(auth: Arc<dyn AuthProvider>, audience: Audience) -> Self {
        Self { auth, audience }
    }
}

#[async_trait]
impl RequestHook for AuthHook {
    async fn before_request(&self, request: &mut Request) -> Result<()> {
        let headers = self.auth.auth_headers(self.audience).await?;
        request.headers_mut().extend(headers);
        Ok(())
    }
}

/// Sends JSON requests to the REST API.
pub struct RestTransport {
    http: reqwest::Client,
    base_url: String,
    user_agent: HeaderValue,
    hooks: Vec<Arc<dyn RequestHook>>,
}

impl RestTransport {
    /// Build a transport whose first hook authenticates for `Audience::Zeebe`.
    pub fn new(
        config: &ClientConfig,
        auth: Arc<dyn AuthProvider>,
        extra_hooks: Vec<Arc<dyn RequestHook>>,
    ) -> Result<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        let user_agent = HeaderValue::from_str(&config.user_agent).map_err(|e| {
            SdkError::InvalidConfiguration(format!("user agent is not a valid header: {e}"))
        })?;

        let mut hooks: Vec<Arc<dyn RequestHook>> =
            vec![Arc::new(AuthHook::new(auth, Audience::Zeebe))];
        hooks.extend(extra_hooks);

        Ok(Self {
            http,
            base_url: format!("{}/v2", config.rest_address.trim_end_matches('/')),
            user_agent,
            hooks,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a request and return the response body.
    ///
    /// `path` is relative to the `/v2` API root. `body` must already be JSON.
    pub async fn send(&self, method: Method, path: &str, body: Option<String>) -> Result<String> {
        match self.execute(method, path, body).await {
            Ok(text) => Ok(text),
            Err(error) => {
                let mut error = error;
                for hook in &self.hooks {
                    error = hook.before_error(error).await;
                }
                Err(error)
            }
        }
    }

    async fn execute(&self, method: Method, path: &str, body: Option<String>) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self
            .http
            .request(method.clone(), &url)
            .header(USER_AGENT, self.user_agent.clone())
            .header(ACCEPT, "application/json");
        if let Some(body) = body {
            builder = builder.header(CONTENT_TYPE, "application/json").body(body);
        }
        let mut request = builder.build()?;
        for hook in &self.hooks {
            hook.before_request(&mut request).await?;
        }

        debug!(method = %method, path, "Sending request");
        let response = self.http.execute(request).await?;
        let status = response.status();
        let text = response.text().await?;
        if status.is_success() {
            return Ok(text);
        }

        debug!(method = %method, path, status = status.as_u16(), "Request failed");
        Err(match ProblemDetail::from_body(&text) {
            Some(mut problem) => {
                problem.status.get_or_insert(status.as_u16());
                SdkError::Problem(problem)
            }
            None => SdkError::Status {
                status: status.as_u16(),
                body: text,
            },
        })
    }
}

impl fmt::Debug for RestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestTransport")
            .field("base_url", &self.base_url)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}
