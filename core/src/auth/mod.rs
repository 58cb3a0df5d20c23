//! Authentication providers
//!
//! Every request to the engine asks an [`AuthProvider`] for the headers to
//! attach. [`OAuthProvider`] obtains client-credentials bearer tokens;
//! [`BasicAuthProvider`] and [`NullAuthProvider`] cover the static cases.

mod oauth;
mod store;
mod token;

pub use oauth::OAuthProvider;
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use token::{decode_jwt_expiry, Token};

use crate::config::AuthStrategy;
use crate::error::CoreResult;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use std::fmt;
use std::sync::Arc;

/// Component API a token is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Audience {
    Zeebe,
    Operate,
    Optimize,
    Tasklist,
    Console,
    Modeler,
}

impl Audience {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zeebe => "ZEEBE",
            Self::Operate => "OPERATE",
            Self::Optimize => "OPTIMIZE",
            Self::Tasklist => "TASKLIST",
            Self::Console => "CONSOLE",
            Self::Modeler => "MODELER",
        }
    }
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of credentials for outgoing requests.
#[async_trait]
pub trait AuthProvider: Send + Sync + fmt::Debug {
    /// Bearer token for `audience`. An empty string means no token.
    async fn get_token(&self, audience: Audience) -> CoreResult<String>;

    /// Headers to attach to a request for `audience`.
    async fn auth_headers(&self, audience: Audience) -> CoreResult<HeaderMap> {
        let token = self.get_token(audience).await?;
        let mut headers = HeaderMap::new();
        if !token.is_empty() {
            headers.insert(AUTHORIZATION, bearer_value(&token)?);
        }
        Ok(headers)
    }
}

fn bearer_value(token: &str) -> CoreResult<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
        crate::error::CoreError::InvalidConfiguration(
            "access token contains characters not allowed in a header".to_string(),
        )
    })?;
    value.set_sensitive(true);
    Ok(value)
}

/// Provider that never authenticates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAuthProvider;

#[async_trait]
impl AuthProvider for NullAuthProvider {
    async fn get_token(&self, _audience: Audience) -> CoreResult<String> {
        Ok(String::new())
    }
}

/// Static HTTP basic authentication.
#[derive(Clone)]
pub struct BasicAuthProvider {
    username: String,
    password: String,
}

impl BasicAuthProvider {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    fn encoded(&self) -> String {
        STANDARD.encode(format!("{}:{}", self.username, self.password))
    }
}

impl fmt::Debug for BasicAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuthProvider")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl AuthProvider for BasicAuthProvider {
    /// The encoded `username:password` pair.
    async fn get_token(&self, _audience: Audience) -> CoreResult<String> {
        Ok(self.encoded())
    }

    async fn auth_headers(&self, _audience: Audience) -> CoreResult<HeaderMap> {
        let mut value = HeaderValue::from_str(&format!("Basic {}", self.encoded())).map_err(|_| {
            crate::error::CoreError::InvalidConfiguration(
                "basic auth credentials contain characters not allowed in a header".to_string(),
            )
        })?;
        value.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }
}

/// Build the provider selected by `strategy`.
pub fn build_auth_provider(strategy: AuthStrategy) -> CoreResult<Arc<dyn AuthProvider>> {
    Ok(match strategy {
        AuthStrategy::OAuth(config) => Arc::new(OAuthProvider::new(config)?),
        AuthStrategy::Basic { username, password } => {
            Arc::new(BasicAuthProvider::new(username, password))
        }
        AuthStrategy::None => Arc::new(NullAuthProvider),
    })
}
