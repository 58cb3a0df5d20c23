//! OAuth2 client-credentials token provider.
//!
//! Tokens are cached per audience in memory and, when a cache directory is
//! configured, mirrored to a durable [`TokenStore`]. At most one token request
//! is in flight per provider; concurrent callers join it. After a failed
//! request the next one is delayed by `failures × backoff_unit`.
//!
//! # Example
//!
//! ```ignore
//! use camunda_core::auth::{Audience, AuthProvider, OAuthProvider};
//! use camunda_core::config::OAuthConfig;
//!
//! let config = OAuthConfig::new("https://login.cloud.camunda.io/oauth/token")
//!     .with_credentials("my-client-id", "my-client-secret");
//! let provider = OAuthProvider::new(config)?;
//! let token = provider.get_token(Audience::Zeebe).await?;
//! ```

use super::store::{FileTokenStore, TokenStore};
use super::token::{decode_jwt_expiry, now_epoch_secs, Token};
use super::{Audience, AuthProvider};
use crate::config::{OAuthConfig, SAAS_MODELER_AUDIENCE};
use crate::error::{CoreError, CoreResult, TokenEndpointError};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

type PendingToken = Shared<BoxFuture<'static, Result<Token, TokenEndpointError>>>;

/// Token request body for the client-credentials grant
#[derive(Serialize)]
struct TokenRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    audience: Option<&'a str>,
    client_id: &'a str,
    client_secret: &'a str,
    grant_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<&'a str>,
}

/// Token endpoint response; success and error bodies share one shape
#[derive(Debug, Default, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    token_type: Option<String>,
    expires_in: Option<u64>,
    scope: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Client id and secret selected for one audience.
struct Credentials {
    client_id: String,
    client_secret: String,
}

/// OAuth client-credentials [`AuthProvider`].
///
/// Cheap to clone; clones share caches and the in-flight request.
#[derive(Clone)]
pub struct OAuthProvider {
    inner: Arc<Inner>,
}

struct Inner {
    config: OAuthConfig,
    http: reqwest::Client,
    memory: Mutex<HashMap<String, Token>>,
    store: Option<Arc<dyn TokenStore>>,
    failures: AtomicU32,
    in_flight: Mutex<Option<PendingToken>>,
}

impl OAuthProvider {
    /// Create a provider. Uses a [`FileTokenStore`] when `config.cache_dir` is set.
    pub fn new(config: OAuthConfig) -> CoreResult<Self> {
        let store = config
            .cache_dir
            .clone()
            .map(|dir| Arc::new(FileTokenStore::new(dir)) as Arc<dyn TokenStore>);
        Self::with_store(config, store)
    }

    /// Create a provider with an explicit durable store (or none).
    pub fn with_store(config: OAuthConfig, store: Option<Arc<dyn TokenStore>>) -> CoreResult<Self> {
        config.validate()?;
        let http = build_http_client(&config)?;
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                http,
                memory: Mutex::new(HashMap::new()),
                store,
                failures: AtomicU32::new(0),
                in_flight: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.inner.config
    }

    /// Consecutive failed token requests since the last success
    pub fn failure_count(&self) -> u32 {
        self.inner.failures.load(Ordering::SeqCst)
    }

    /// Drop every token held in memory
    pub fn flush_memory_cache(&self) {
        self.inner.memory.lock().clear();
        debug!("Flushed in-memory token cache");
    }

    /// Drop every token held in the durable store
    pub fn flush_file_cache(&self) {
        if let Some(store) = &self.inner.store {
            match store.flush() {
                Ok(()) => debug!("Flushed durable token cache"),
                Err(e) => warn!(error = %e, "Failed to flush durable token cache"),
            }
        }
    }

    async fn token_for(&self, audience: Audience) -> CoreResult<Token> {
        let credentials = self.inner.credentials_for(audience)?;
        let primary_id = self
            .inner
            .config
            .client_id
            .as_deref()
            .unwrap_or(&credentials.client_id);
        let memory_key = format!("{primary_id}-{audience}");
        let durable_key = format!("{}-{audience}", credentials.client_id);

        loop {
            if let Some(token) = self.inner.memory_lookup(&memory_key) {
                return Ok(token);
            }
            if let Some(token) = self.inner.durable_lookup(&durable_key) {
                self.inner
                    .memory
                    .lock()
                    .insert(memory_key.clone(), token.clone());
                return Ok(token);
            }

            let pending = self.join_or_start(audience, &credentials, &memory_key, &durable_key);
            let token = pending.await?;

            // The gate is shared across audiences; a joined request for a
            // different audience only means the gate is free again.
            if token.audience == audience.as_str() {
                return Ok(token);
            }
            debug!(
                requested = %audience,
                received = %token.audience,
                "Joined token request was for another audience, retrying"
            );
        }
    }

    fn join_or_start(
        &self,
        audience: Audience,
        credentials: &Credentials,
        memory_key: &str,
        durable_key: &str,
    ) -> PendingToken {
        let mut gate = self.inner.in_flight.lock();
        if let Some(pending) = gate.as_ref() {
            debug!(audience = %audience, "Joining in-flight token request");
            return pending.clone();
        }

        let inner = Arc::clone(&self.inner);
        let client_id = credentials.client_id.clone();
        let client_secret = credentials.client_secret.clone();
        let memory_key = memory_key.to_string();
        let durable_key = durable_key.to_string();

        let request = async move {
            let failures = inner.failures.load(Ordering::SeqCst);
            if failures > 0 {
                let delay = inner.config.backoff_unit * failures;
                debug!(failures, delay_ms = delay.as_millis() as u64, "Backing off before token request");
                tokio::time::sleep(delay).await;
            }

            let result = inner
                .request_token(audience, &client_id, &client_secret)
                .await;
            match &result {
                Ok(token) => {
                    inner.failures.store(0, Ordering::SeqCst);
                    inner.memory.lock().insert(memory_key, token.clone());
                    if let Some(store) = &inner.store {
                        if let Err(e) = store.set(&durable_key, token) {
                            warn!(error = %e, key = %durable_key, "Failed to persist token");
                        }
                    }
                }
                Err(e) => {
                    let failures = inner.failures.fetch_add(1, Ordering::SeqCst) + 1;
                    warn!(audience = %audience, failures, error = %e, "Token request failed");
                }
            }
            inner.in_flight.lock().take();
            result
        }
        .boxed()
        .shared();

        *gate = Some(request.clone());
        drop(gate);

        // Drive the request to completion even if every caller goes away,
        // so the gate is always cleared.
        let driver = request.clone();
        tokio::spawn(async move {
            let _ = driver.await;
        });
        request
    }
}

impl Inner {
    fn credentials_for(&self, audience: Audience) -> CoreResult<Credentials> {
        let console = self.config.is_saas() && matches!(audience, Audience::Console | Audience::Modeler);
        let (id, secret, id_var, secret_var) = if console {
            (
                &self.config.console_client_id,
                &self.config.console_client_secret,
                "CAMUNDA_CONSOLE_CLIENT_ID",
                "CAMUNDA_CONSOLE_CLIENT_SECRET",
            )
        } else {
            (
                &self.config.client_id,
                &self.config.client_secret,
                "ZEEBE_CLIENT_ID",
                "ZEEBE_CLIENT_SECRET",
            )
        };
        let client_id = id
            .clone()
            .ok_or_else(|| CoreError::MissingConfiguration(id_var.to_string()))?;
        let client_secret = secret
            .clone()
            .ok_or_else(|| CoreError::MissingConfiguration(secret_var.to_string()))?;
        Ok(Credentials {
            client_id,
            client_secret,
        })
    }

    /// Audience parameter sent for `audience`; `None` omits it.
    fn audience_param(&self, audience: Audience) -> Option<String> {
        let audiences = &self.config.audiences;
        match audience {
            Audience::Zeebe => Some(audiences.zeebe.clone()),
            Audience::Operate => Some(audiences.operate.clone()),
            Audience::Optimize => Some(audiences.optimize.clone()),
            Audience::Tasklist => Some(audiences.tasklist.clone()),
            Audience::Console => audiences.console.clone(),
            Audience::Modeler if self.config.is_saas() => Some(SAAS_MODELER_AUDIENCE.to_string()),
            Audience::Modeler => audiences.modeler.clone(),
        }
    }

    fn memory_lookup(&self, key: &str) -> Option<Token> {
        let mut memory = self.memory.lock();
        let token = memory.get(key)?;
        if token.is_expired(self.config.refresh_window) {
            debug!(key, "Evicting expired token from memory");
            memory.remove(key);
            return None;
        }
        debug!(key, "Using token from memory");
        Some(token.clone())
    }

    fn durable_lookup(&self, key: &str) -> Option<Token> {
        let store = self.store.as_ref()?;
        match store.get(key) {
            Ok(Some(token)) if !token.is_expired(self.config.refresh_window) => {
                debug!(key, "Using token from durable cache");
                Some(token)
            }
            Ok(Some(_)) => {
                debug!(key, "Evicting expired token from durable cache");
                if let Err(e) = store.delete(key) {
                    warn!(error = %e, key, "Failed to delete expired token");
                }
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, key, "Failed to read durable token cache");
                None
            }
        }
    }

    async fn request_token(
        &self,
        audience: Audience,
        client_id: &str,
        client_secret: &str,
    ) -> Result<Token, TokenEndpointError> {
        let audience_param = self.audience_param(audience);
        let body = TokenRequest {
            audience: audience_param.as_deref(),
            client_id,
            client_secret,
            grant_type: "client_credentials",
            scope: self.config.scope.as_deref(),
        };

        debug!(
            endpoint = %self.config.oauth_url,
            client_id,
            audience = %audience,
            "Requesting OAuth token"
        );

        let response = self
            .http
            .post(&self.config.oauth_url)
            .form(&body)
            .send()
            .await
            .map_err(|e| TokenEndpointError::new(format!("Failed to send token request: {e}")))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| TokenEndpointError {
            message: format!("Failed to read token response: {e}"),
            error_code: None,
            status: Some(status.as_u16()),
        })?;
        let parsed: TokenResponse = serde_json::from_str(&text).unwrap_or_default();

        if let Some(code) = parsed.error {
            let message = match parsed.error_description {
                Some(desc) => format!("{code}: {desc}"),
                None => code.clone(),
            };
            return Err(TokenEndpointError {
                message,
                error_code: Some(code),
                status: Some(status.as_u16()),
            });
        }

        let access_token = match parsed.access_token {
            Some(token) if status.is_success() => token,
            _ => {
                return Err(TokenEndpointError {
                    message: format!("Token endpoint returned {status} without an access token: {text}"),
                    error_code: None,
                    status: Some(status.as_u16()),
                })
            }
        };

        let expires_in = parsed.expires_in.unwrap_or(0);
        let expiry = decode_jwt_expiry(&access_token).unwrap_or_else(|| {
            now_epoch_secs().saturating_add(i64::try_from(expires_in).unwrap_or(i64::MAX))
        });

        info!(audience = %audience, expires_in, "Obtained OAuth token");
        Ok(Token {
            access_token,
            scope: parsed.scope,
            expires_in,
            token_type: parsed.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expiry,
            audience: audience.to_string(),
        })
    }
}

#[async_trait]
impl AuthProvider for OAuthProvider {
    async fn get_token(&self, audience: Audience) -> CoreResult<String> {
        self.token_for(audience).await.map(|t| t.access_token)
    }
}

impl std::fmt::Debug for OAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthProvider")
            .field("config", &self.inner.config)
            .field("store", &self.inner.store)
            .field("failures", &self.failure_count())
            .finish()
    }
}

fn build_http_client(config: &OAuthConfig) -> CoreResult<reqwest::Client> {
    let mut builder = reqwest::Client::builder().timeout(config.request_timeout);

    if let Some(path) = &config.root_cert_path {
        let pem = std::fs::read(path)?;
        builder = builder.add_root_certificate(reqwest::Certificate::from_pem(&pem)?);
    }

    if let (Some(chain), Some(key)) = (&config.cert_chain_path, &config.private_key_path) {
        let mut pem = std::fs::read(chain)?;
        pem.push(b'\n');
        pem.extend(std::fs::read(key)?);
        builder = builder.identity(reqwest::Identity::from_pem(&pem)?);
    }

    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AudienceConfig;

    fn provider(url: &str) -> OAuthProvider {
        OAuthProvider::with_store(
            OAuthConfig::new(url)
                .with_credentials("primary", "primary-secret")
                .with_console_credentials("console", "console-secret"),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_credential_selection_saas() {
        let p = provider("https://login.cloud.camunda.io/oauth/token");
        assert_eq!(
            p.inner.credentials_for(Audience::Console).unwrap().client_id,
            "console"
        );
        assert_eq!(
            p.inner.credentials_for(Audience::Modeler).unwrap().client_id,
            "console"
        );
        assert_eq!(
            p.inner.credentials_for(Audience::Zeebe).unwrap().client_id,
            "primary"
        );
    }

    #[test]
    fn test_credential_selection_self_managed() {
        let p = provider("http://keycloak/token");
        assert_eq!(
            p.inner.credentials_for(Audience::Console).unwrap().client_id,
            "primary"
        );
    }

    #[test]
    fn test_missing_console_credentials() {
        let p = OAuthProvider::with_store(
            OAuthConfig::new("https://login.cloud.camunda.io/oauth/token")
                .with_credentials("primary", "secret"),
            None,
        )
        .unwrap();
        let err = p.inner.credentials_for(Audience::Console).err().unwrap();
        assert!(
            matches!(err, CoreError::MissingConfiguration(ref v) if v == "CAMUNDA_CONSOLE_CLIENT_ID")
        );
    }

    #[test]
    fn test_audience_policy() {
        let saas = provider("https://login.cloud.camunda.io/oauth/token");
        assert_eq!(saas.inner.audience_param(Audience::Console), None);
        assert_eq!(
            saas.inner.audience_param(Audience::Modeler).as_deref(),
            Some("api.cloud.camunda.io")
        );
        assert_eq!(
            saas.inner.audience_param(Audience::Zeebe).as_deref(),
            Some("zeebe.camunda.io")
        );

        let self_managed = OAuthProvider::with_store(
            OAuthConfig::new("http://keycloak/token").with_audiences(AudienceConfig {
                operate: "custom-operate".to_string(),
                console: Some("console-aud".to_string()),
                ..AudienceConfig::default()
            }),
            None,
        )
        .unwrap();
        assert_eq!(self_managed.inner.audience_param(Audience::Modeler), None);
        assert_eq!(
            self_managed.inner.audience_param(Audience::Console).as_deref(),
            Some("console-aud")
        );
        assert_eq!(
            self_managed.inner.audience_param(Audience::Operate).as_deref(),
            Some("custom-operate")
        );
    }

    #[test]
    fn test_token_request_form_omits_absent_fields() {
        let body = TokenRequest {
            audience: None,
            client_id: "id",
            client_secret: "secret",
            grant_type: "client_credentials",
            scope: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("audience").is_none());
        assert!(json.get("scope").is_none());
        assert_eq!(json["grant_type"], "client_credentials");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug = format!("{:?}", provider("http://idp/token"));
        assert!(!debug.contains("primary-secret"));
        assert!(!debug.contains("console-secret"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(OAuthProvider::new(OAuthConfig::new("")).is_err());
    }
}
