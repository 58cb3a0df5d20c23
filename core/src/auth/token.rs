//! Bearer tokens and expiry decoding.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// A bearer token obtained for one audience.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default)]
    pub scope: Option<String>,
    /// Lifetime reported by the token endpoint, in seconds
    pub expires_in: u64,
    pub token_type: String,
    /// Expiry as epoch seconds
    pub expiry: i64,
    pub audience: String,
}

impl Token {
    /// Whether the token is expired, or will be within `refresh_window`.
    pub fn is_expired_at(&self, now: i64, refresh_window: Duration) -> bool {
        let window = i64::try_from(refresh_window.as_secs()).unwrap_or(i64::MAX);
        now.saturating_add(window) >= self.expiry
    }

    /// [`is_expired_at`](Self::is_expired_at) against the current time.
    pub fn is_expired(&self, refresh_window: Duration) -> bool {
        self.is_expired_at(now_epoch_secs(), refresh_window)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"[REDACTED]")
            .field("scope", &self.scope)
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .field("expiry", &self.expiry)
            .field("audience", &self.audience)
            .finish()
    }
}

#[derive(Deserialize)]
struct ExpiryClaim {
    exp: Option<i64>,
}

/// Read the `exp` claim of a JWT without verifying its signature.
///
/// Returns `None` when the token is not a decodable JWT or carries no
/// expiry.
pub fn decode_jwt_expiry(access_token: &str) -> Option<i64> {
    let payload = access_token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice::<ExpiryClaim>(&bytes).ok()?.exp
}

pub(crate) fn now_epoch_secs() -> i64 {
    chrono::Utc::now().timestamp()
}
