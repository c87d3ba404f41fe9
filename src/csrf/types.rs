//! CSRF token types
//!
//! The cached token value with its issue/expiry instants, and the wire
//! shape of the token endpoint response.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

/// Token lifetime applied when the server omits `expiresIn`, in milliseconds.
pub const DEFAULT_TOKEN_TTL_MS: u64 = 3_600_000;

/// A server-issued anti-forgery token with its validity window
#[derive(Debug, Clone)]
pub struct CsrfToken {
    /// The opaque token value
    pub value: String,
    /// When the token was obtained
    pub issued_at: DateTime<Utc>,
    /// When the token stops being usable
    pub expires_at: DateTime<Utc>,
}

impl CsrfToken {
    /// Create a token valid for `ttl_ms` milliseconds from now
    pub fn new(value: String, ttl_ms: u64) -> Self {
        let issued_at = Utc::now();
        let ttl = Duration::milliseconds(i64::try_from(ttl_ms).unwrap_or(i64::MAX));
        let expires_at = issued_at
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            value,
            issued_at,
            expires_at,
        }
    }

    /// True while `now` is strictly before the expiry instant
    pub fn is_valid(&self) -> bool {
        Utc::now() < self.expires_at
    }
}

/// Response body of `GET /csrf-token`
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub token: String,
    /// Remaining lifetime in milliseconds
    #[serde(rename = "expiresIn", default)]
    pub expires_in: Option<u64>,
}
