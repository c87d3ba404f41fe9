//! CSRF token manager
//!
//! Guarantees that any caller needing an anti-forgery header receives a
//! currently-valid token, refreshing transparently when the cache is empty
//! or expired.
//!
//! Concurrent callers that hit an expired cache must not each fetch their
//! own token: all of them attach to a single in-flight refresh and receive
//! its result or its failure. The in-flight refresh is held as a shared
//! future in a dedicated slot; the slot is cleared once the refresh
//! resolves, and a resolved future left behind by cancelled waiters is
//! replaced rather than reused.

use super::types::{CsrfToken, TokenResponse, DEFAULT_TOKEN_TTL_MS};
use crate::error::{Error, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Header carrying the anti-forgery token on mutating requests
pub const CSRF_TOKEN_HEADER: &str = "X-CSRF-Token";

/// Companion header identifying programmatic requests
pub const REQUESTED_WITH_HEADER: &str = "X-Requested-With";

/// One outstanding refresh, shareable between all waiting callers.
///
/// The error side is `Arc`-wrapped so a single failure can fan out to
/// every waiter.
type SharedRefresh = Shared<BoxFuture<'static, std::result::Result<CsrfToken, Arc<Error>>>>;

/// Owns the cached anti-forgery token and its refresh lifecycle
pub struct CsrfTokenManager {
    /// HTTP client used for token requests; shares the cookie store with
    /// the main request client so session credentials ride along
    http_client: Client,
    /// Fully-qualified token endpoint URL
    token_url: String,
    /// Cached token; the old value stays servable while a refresh is in
    /// flight and is replaced or cleared atomically when it resolves
    cached: Arc<RwLock<Option<CsrfToken>>>,
    /// The single outstanding refresh, if any
    in_flight: Mutex<Option<SharedRefresh>>,
}

impl CsrfTokenManager {
    /// Create a manager fetching tokens from `{base_url}/csrf-token`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a manager using an existing HTTP client
    pub fn with_client(base_url: impl Into<String>, http_client: Client) -> Self {
        let base = base_url.into();
        Self {
            http_client,
            token_url: format!("{}/csrf-token", base.trim_end_matches('/')),
            cached: Arc::new(RwLock::new(None)),
            in_flight: Mutex::new(None),
        }
    }

    /// Get a currently-valid token, refreshing if necessary.
    ///
    /// Returns without I/O while the cached token is inside its validity
    /// window. A token at or past its expiry is never returned.
    pub async fn get_token(&self) -> Result<String> {
        {
            let cached = self.cached.read().await;
            if let Some(token) = cached.as_ref() {
                if token.is_valid() {
                    return Ok(token.value.clone());
                }
            }
        }

        let refresh = {
            let mut slot = self.in_flight.lock().await;
            match slot.as_ref() {
                // Attach to the outstanding refresh. A future that already
                // resolved belongs to a finished cycle and is not reusable.
                Some(existing) if existing.peek().is_none() => existing.clone(),
                _ => {
                    let fresh = self.spawn_refresh();
                    *slot = Some(fresh.clone());
                    fresh
                }
            }
        };

        let outcome = refresh.clone().await;

        {
            let mut slot = self.in_flight.lock().await;
            if slot.as_ref().is_some_and(|current| current.ptr_eq(&refresh)) {
                *slot = None;
            }
        }

        match outcome {
            Ok(token) => Ok(token.value),
            Err(err) => Err(Error::csrf(err.to_string())),
        }
    }

    /// Build the anti-forgery headers for a mutating request
    pub async fn headers(&self) -> Result<HeaderMap> {
        let token = self.get_token().await?;
        let value = HeaderValue::from_str(&token)
            .map_err(|_| Error::csrf("token contains characters not valid in a header"))?;

        let mut headers = HeaderMap::new();
        headers.insert(CSRF_TOKEN_HEADER, value);
        headers.insert(
            REQUESTED_WITH_HEADER,
            HeaderValue::from_static("XMLHttpRequest"),
        );
        Ok(headers)
    }

    /// Drop the cached token; used on logout and account switch
    pub async fn clear_token(&self) {
        let mut cached = self.cached.write().await;
        *cached = None;
    }

    /// True if a token is cached and inside its validity window
    pub async fn has_valid_token(&self) -> bool {
        self.cached
            .read()
            .await
            .as_ref()
            .is_some_and(CsrfToken::is_valid)
    }

    /// Start a refresh that stores the new token on success and clears the
    /// cache on failure, so stale or partial state is never exposed.
    fn spawn_refresh(&self) -> SharedRefresh {
        let client = self.http_client.clone();
        let token_url = self.token_url.clone();
        let cache = Arc::clone(&self.cached);

        async move {
            match fetch_token(&client, &token_url).await {
                Ok(token) => {
                    *cache.write().await = Some(token.clone());
                    debug!(expires_at = %token.expires_at, "CSRF token refreshed");
                    Ok(token)
                }
                Err(err) => {
                    *cache.write().await = None;
                    Err(Arc::new(err))
                }
            }
        }
        .boxed()
        .shared()
    }
}

impl std::fmt::Debug for CsrfTokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsrfTokenManager")
            .field("token_url", &self.token_url)
            .finish_non_exhaustive()
    }
}

/// Fetch a fresh token from the token endpoint
async fn fetch_token(client: &Client, token_url: &str) -> Result<CsrfToken> {
    debug!(url = token_url, "fetching CSRF token");

    let response = client.get(token_url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::csrf(format!(
            "token endpoint returned HTTP {}",
            status.as_u16()
        )));
    }

    let body: TokenResponse = response
        .json()
        .await
        .map_err(|err| Error::csrf(format!("malformed token response: {err}")))?;

    if body.token.is_empty() {
        return Err(Error::csrf("token endpoint returned an empty token"));
    }

    Ok(CsrfToken::new(
        body.token,
        body.expires_in.unwrap_or(DEFAULT_TOKEN_TTL_MS),
    ))
}
