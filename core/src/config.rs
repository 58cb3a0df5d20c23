//! Authentication configuration
//!
//! [`OAuthConfig`] describes a client-credentials token endpoint together
//! with the credentials, audiences and cache settings used against it.
//! [`AuthStrategy`] selects between OAuth, static basic auth and no auth.
//! Both can be built programmatically or loaded from the conventional
//! `CAMUNDA_*` / `ZEEBE_*` environment variables.

use crate::error::{CoreError, CoreResult};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Host fragment identifying the SaaS token endpoint.
pub const SAAS_OAUTH_HOST: &str = "login.cloud.camunda.io";

/// Audience requested for the Modeler API on SaaS.
pub const SAAS_MODELER_AUDIENCE: &str = "api.cloud.camunda.io";

/// Audience strings sent to the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudienceConfig {
    pub zeebe: String,
    pub operate: String,
    pub optimize: String,
    pub tasklist: String,
    /// Omitted from the token request when unset
    pub console: Option<String>,
    /// Omitted from the token request when unset on self-managed
    pub modeler: Option<String>,
}

impl Default for AudienceConfig {
    fn default() -> Self {
        Self {
            zeebe: "zeebe.camunda.io".to_string(),
            operate: "operate.camunda.io".to_string(),
            optimize: "optimize.camunda.io".to_string(),
            tasklist: "tasklist.camunda.io".to_string(),
            console: None,
            modeler: None,
        }
    }
}

/// OAuth client-credentials configuration
#[derive(Clone)]
pub struct OAuthConfig {
    /// Token endpoint URL
    pub oauth_url: String,
    /// Primary client id
    pub client_id: Option<String>,
    /// Primary client secret
    pub client_secret: Option<String>,
    /// Client id used for Console and Modeler on SaaS
    pub console_client_id: Option<String>,
    /// Client secret used for Console and Modeler on SaaS
    pub console_client_secret: Option<String>,
    /// Optional scope parameter
    pub scope: Option<String>,
    pub audiences: AudienceConfig,
    /// A token is renewed once it is this close to expiry
    pub refresh_window: Duration,
    /// Delay added per consecutive failed token request
    pub backoff_unit: Duration,
    /// Timeout for a single token request
    pub request_timeout: Duration,
    /// Durable token cache directory; `None` disables the durable cache
    pub cache_dir: Option<PathBuf>,
    /// PEM certificate chain for mutual TLS
    pub cert_chain_path: Option<PathBuf>,
    /// PEM private key for mutual TLS
    pub private_key_path: Option<PathBuf>,
    /// Additional PEM root certificate to trust
    pub root_cert_path: Option<PathBuf>,
}

impl OAuthConfig {
    pub const DEFAULT_REFRESH_WINDOW: Duration = Duration::from_secs(60);
    pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_secs(1);
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Create a configuration for the given token endpoint
    pub fn new(oauth_url: impl Into<String>) -> Self {
        Self {
            oauth_url: oauth_url.into(),
            client_id: None,
            client_secret: None,
            console_client_id: None,
            console_client_secret: None,
            scope: None,
            audiences: AudienceConfig::default(),
            refresh_window: Self::DEFAULT_REFRESH_WINDOW,
            backoff_unit: Self::DEFAULT_BACKOFF_UNIT,
            request_timeout: Self::DEFAULT_REQUEST_TIMEOUT,
            cache_dir: None,
            cert_chain_path: None,
            private_key_path: None,
            root_cert_path: None,
        }
    }

    /// Set the primary credentials
    pub fn with_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.client_id = Some(client_id.into());
        self.client_secret = Some(client_secret.into());
        self
    }

    /// Set the credentials used for Console and Modeler on SaaS
    pub fn with_console_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.console_client_id = Some(client_id.into());
        self.console_client_secret = Some(client_secret.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_audiences(mut self, audiences: AudienceConfig) -> Self {
        self.audiences = audiences;
        self
    }

    pub fn with_refresh_window(mut self, window: Duration) -> Self {
        self.refresh_window = window;
        self
    }

    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Enable the durable token cache in `dir`
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Disable the durable token cache
    pub fn without_cache_dir(mut self) -> Self {
        self.cache_dir = None;
        self
    }

    /// Present a client certificate to the token endpoint
    pub fn with_client_identity(
        mut self,
        cert_chain: impl Into<PathBuf>,
        private_key: impl Into<PathBuf>,
    ) -> Self {
        self.cert_chain_path = Some(cert_chain.into());
        self.private_key_path = Some(private_key.into());
        self
    }

    pub fn with_root_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.root_cert_path = Some(path.into());
        self
    }

    /// Whether the endpoint is the SaaS identity provider
    pub fn is_saas(&self) -> bool {
        self.oauth_url.contains(SAAS_OAUTH_HOST)
    }

    /// Check internal consistency.
    ///
    /// Missing credentials are not an error here: they are reported by the
    /// provider when a token for an audience that needs them is requested.
    pub fn validate(&self) -> CoreResult<()> {
        if self.oauth_url.trim().is_empty() {
            return Err(CoreError::MissingConfiguration(
                "CAMUNDA_OAUTH_URL".to_string(),
            ));
        }
        if !(self.oauth_url.starts_with("http://") || self.oauth_url.starts_with("https://")) {
            return Err(CoreError::InvalidConfiguration(format!(
                "oauth_url must be an http(s) URL, got '{}'",
                self.oauth_url
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(CoreError::InvalidConfiguration(
                "request_timeout must be positive".to_string(),
            ));
        }
        if self.cert_chain_path.is_some() != self.private_key_path.is_some() {
            return Err(CoreError::InvalidConfiguration(
                "client certificate chain and private key must be configured together"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Load from the process environment
    pub fn from_env() -> CoreResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> CoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let oauth_url = get("CAMUNDA_OAUTH_URL")
            .ok_or_else(|| CoreError::MissingConfiguration("CAMUNDA_OAUTH_URL".to_string()))?;
        let mut config = Self::new(oauth_url);

        config.client_id = get("ZEEBE_CLIENT_ID");
        config.client_secret = get("ZEEBE_CLIENT_SECRET");
        config.console_client_id = get("CAMUNDA_CONSOLE_CLIENT_ID");
        config.console_client_secret = get("CAMUNDA_CONSOLE_CLIENT_SECRET");
        config.scope = get("CAMUNDA_TOKEN_SCOPE");

        let defaults = AudienceConfig::default();
        config.audiences = AudienceConfig {
            zeebe: get("CAMUNDA_ZEEBE_OAUTH_AUDIENCE")
                .or_else(|| get("ZEEBE_TOKEN_AUDIENCE"))
                .unwrap_or(defaults.zeebe),
            operate: get("CAMUNDA_OPERATE_OAUTH_AUDIENCE").unwrap_or(defaults.operate),
            optimize: get("CAMUNDA_OPTIMIZE_OAUTH_AUDIENCE").unwrap_or(defaults.optimize),
            tasklist: get("CAMUNDA_TASKLIST_OAUTH_AUDIENCE").unwrap_or(defaults.tasklist),
            console: get("CAMUNDA_CONSOLE_OAUTH_AUDIENCE"),
            modeler: get("CAMUNDA_MODELER_OAUTH_AUDIENCE"),
        };

        if let Some(ms) = get("CAMUNDA_OAUTH_TOKEN_REFRESH_THRESHOLD_MS") {
            let ms: u64 = ms.trim().parse().map_err(|_| {
                CoreError::InvalidConfiguration(format!(
                    "CAMUNDA_OAUTH_TOKEN_REFRESH_THRESHOLD_MS must be milliseconds, got '{ms}'"
                ))
            })?;
            config.refresh_window = Duration::from_millis(ms);
        }

        let disk_cache_disabled = get("CAMUNDA_TOKEN_DISK_CACHE_DISABLE")
            .map(|v| is_truthy(&v))
            .unwrap_or(false);
        config.cache_dir = if disk_cache_disabled {
            None
        } else {
            get("CAMUNDA_TOKEN_CACHE_DIR")
                .map(PathBuf::from)
                .or_else(|| get("HOME").map(|home| PathBuf::from(home).join(".camunda")))
        };

        config.root_cert_path = get("CAMUNDA_CUSTOM_ROOT_CERT_PATH").map(PathBuf::from);
        config.cert_chain_path = get("CAMUNDA_CUSTOM_CERT_CHAIN_PATH").map(PathBuf::from);
        config.private_key_path = get("CAMUNDA_CUSTOM_PRIVATE_KEY_PATH").map(PathBuf::from);

        config.validate()?;
        Ok(config)
    }
}

impl fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |s: &Option<String>| s.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("OAuthConfig")
            .field("oauth_url", &self.oauth_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("console_client_id", &self.console_client_id)
            .field("console_client_secret", &redact(&self.console_client_secret))
            .field("scope", &self.scope)
            .field("audiences", &self.audiences)
            .field("refresh_window", &self.refresh_window)
            .field("backoff_unit", &self.backoff_unit)
            .field("request_timeout", &self.request_timeout)
            .field("cache_dir", &self.cache_dir)
            .field("cert_chain_path", &self.cert_chain_path)
            .field("private_key_path", &self.private_key_path)
            .field("root_cert_path", &self.root_cert_path)
            .finish()
    }
}

/// How requests to the engine are authenticated
#[derive(Clone)]
pub enum AuthStrategy {
    /// OAuth client-credentials bearer tokens
    OAuth(OAuthConfig),
    /// Static HTTP basic auth
    Basic { username: String, password: String },
    /// No `Authorization` header
    None,
}

impl AuthStrategy {
    /// Load from the process environment
    pub fn from_env() -> CoreResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Select and load a strategy from an arbitrary variable source.
    ///
    /// `CAMUNDA_OAUTH_DISABLED=true` forces [`AuthStrategy::None`]; otherwise
    /// `CAMUNDA_AUTH_STRATEGY` chooses `OAUTH` (the default), `BASIC` or `NONE`.
    pub fn from_lookup<F>(lookup: F) -> CoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if lookup("CAMUNDA_OAUTH_DISABLED").is_some_and(|v| is_truthy(&v)) {
            return Ok(Self::None);
        }

        let strategy = lookup("CAMUNDA_AUTH_STRATEGY")
            .map(|s| s.trim().to_ascii_uppercase())
            .unwrap_or_else(|| "OAUTH".to_string());

        match strategy.as_str() {
            "OAUTH" => OAuthConfig::from_lookup(lookup).map(Self::OAuth),
            "BASIC" => {
                let username = lookup("CAMUNDA_BASIC_AUTH_USERNAME").ok_or_else(|| {
                    CoreError::MissingConfiguration("CAMUNDA_BASIC_AUTH_USERNAME".to_string())
                })?;
                let password = lookup("CAMUNDA_BASIC_AUTH_PASSWORD").ok_or_else(|| {
                    CoreError::MissingConfiguration("CAMUNDA_BASIC_AUTH_PASSWORD".to_string())
                })?;
                Ok(Self::Basic { username, password })
            }
            "NONE" => Ok(Self::None),
            other => Err(CoreError::InvalidConfiguration(format!(
                "unknown CAMUNDA_AUTH_STRATEGY '{other}', expected OAUTH, BASIC or NONE"
            ))),
        }
    }
}

impl fmt::Debug for AuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OAuth(config) => f.debug_tuple("OAuth").field(config).finish(),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            Self::None => f.write_str("None"),
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes"
    )
}
