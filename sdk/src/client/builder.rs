//! CamundaRestClient builder for fluent configuration

use super::rest::CamundaRestClient;
use super::transport::RequestHook;
use crate::config::ClientConfig;
use crate::error::Result;
use camunda_core::{build_auth_provider, AuthProvider, AuthStrategy, NullAuthProvider};
use std::sync::Arc;
use std::time::Duration;

/// Builder for creating CamundaRestClient instances
///
/// Example:
/// ```ignore
/// let client = CamundaRestClient::builder()
///     .rest_address("https://bru-2.zeebe.camunda.io/my-cluster")
///     .auth_strategy(AuthStrategy::from_env()?)
///     .tenant_id("finance")
///     .build()?;
/// ```
pub struct CamundaClientBuilder {
    config: ClientConfig,
    auth: Option<Arc<dyn AuthProvider>>,
    strategy: Option<AuthStrategy>,
    hooks: Vec<Arc<dyn RequestHook>>,
}

impl Default for CamundaClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CamundaClientBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            auth: None,
            strategy: None,
            hooks: Vec::new(),
        }
    }

    /// Start from the process environment: REST address, tenant and auth
    /// strategy are all read from `CAMUNDA_*` / `ZEEBE_*` variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new()
            .config(ClientConfig::from_env()?)
            .auth_strategy(AuthStrategy::from_env()?))
    }

    /// Set the REST API address
    ///
    /// Default: "http://localhost:8080"
    pub fn rest_address(mut self, address: impl Into<String>) -> Self {
        self.config.rest_address = address.into();
        self
    }

    /// Set the tenant used when a request names none
    pub fn tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.config.tenant_id = Some(tenant_id.into());
        self
    }

    /// Set the HTTP request timeout
    ///
    /// Default: 30 seconds
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the complete client configuration
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Use an existing auth provider
    ///
    /// Takes precedence over [`auth_strategy`](Self::auth_strategy).
    pub fn auth_provider(mut self, provider: Arc<dyn AuthProvider>) -> Self {
        self.auth = Some(provider);
        self
    }

    /// Build the auth provider from a strategy at `build()` time
    pub fn auth_strategy(mut self, strategy: AuthStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Register a hook run before every request, after authentication
    pub fn request_hook(mut self, hook: impl RequestHook + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Build the client
    ///
    /// Without a provider or strategy, requests are sent unauthenticated.
    pub fn build(self) -> Result<CamundaRestClient> {
        let auth: Arc<dyn AuthProvider> = match (self.auth, self.strategy) {
            (Some(provider), _) => provider,
            (None, Some(strategy)) => build_auth_provider(strategy)?,
            (None, None) => Arc::new(NullAuthProvider),
        };
        CamundaRestClient::new(&self.config, auth, self.hooks)
    }
}
