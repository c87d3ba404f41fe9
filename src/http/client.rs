//! Resilient HTTP client
//!
//! The single choke point for all backend calls. Owns input validation,
//! admission control, CSRF augmentation, timeout-bounded execution, outcome
//! classification, and bounded retry with exponential backoff.

use super::rate_limit::{categorize, RateLimiter};
use crate::csrf::CsrfTokenManager;
use crate::error::{Error, Result};
use crate::types::{JsonValue, Method, StringMap};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Request timeout applied when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Total attempts (first try included) applied when none is configured
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Base backoff delay applied when none is configured
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Upper bound on a single backoff sleep
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(30);

/// Static client configuration, validated at construction time
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL all endpoints are resolved against
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Total attempts per request, first try included
    pub retry_attempts: u32,
    /// Base delay for exponential backoff between attempts
    pub retry_delay: Duration,
}

impl ApiConfig {
    /// Create a config with default timeout and retry settings
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Read the configuration from `LEDGERLINE_API_*` environment variables
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("LEDGERLINE_API_URL")
            .map_err(|_| Error::missing_field("LEDGERLINE_API_URL"))?;
        let mut config = Self::new(base_url);

        if let Some(timeout) = read_env_ms("LEDGERLINE_API_TIMEOUT_MS")? {
            config.timeout = timeout;
        }
        if let Ok(raw) = std::env::var("LEDGERLINE_API_RETRY_ATTEMPTS") {
            config.retry_attempts = raw.parse().map_err(|_| {
                Error::invalid_value("LEDGERLINE_API_RETRY_ATTEMPTS", "must be an integer")
            })?;
        }
        if let Some(delay) = read_env_ms("LEDGERLINE_API_RETRY_DELAY_MS")? {
            config.retry_delay = delay;
        }
        Ok(config)
    }

    /// Set the per-request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the total attempts per request
    #[must_use]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// Set the base backoff delay
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

fn read_env_ms(name: &str) -> Result<Option<Duration>> {
    match std::env::var(name) {
        Ok(raw) => {
            let ms: u64 = raw.parse().map_err(|_| {
                Error::invalid_value(name, "must be an integer number of milliseconds")
            })?;
            Ok(Some(Duration::from_millis(ms)))
        }
        Err(_) => Ok(None),
    }
}

/// Configuration for a single request
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Extra request headers
    pub headers: StringMap,
    /// Query parameters
    pub query: StringMap,
    /// JSON request body
    pub body: Option<JsonValue>,
    /// Override the configured timeout for this request
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    /// Create empty request options
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Set the JSON body
    #[must_use]
    pub fn json(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    /// Override the timeout for this request
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// HTTP client with admission control, CSRF augmentation, and bounded retry
pub struct ApiClient {
    client: Client,
    config: ApiConfig,
    base_url: Url,
    csrf: CsrfTokenManager,
    rate_limiter: RateLimiter,
}

impl ApiClient {
    /// Create a client, validating the base URL and configuration.
    ///
    /// Invalid input fails here, loudly, never at first request.
    pub fn new(config: ApiConfig) -> Result<Self> {
        let base_url = validate_base_url(&config.base_url)?;
        validate_limits(&config)?;

        let client = Client::builder()
            .cookie_store(true)
            .timeout(config.timeout)
            .user_agent(format!("ledgerline-client/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| Error::config(format!("failed to build HTTP client: {err}")))?;

        let csrf =
            CsrfTokenManager::with_client(base_url.as_str().trim_end_matches('/'), client.clone());

        Ok(Self {
            client,
            config,
            base_url,
            csrf,
            rate_limiter: RateLimiter::new(),
        })
    }

    /// Replace the rate limiter, e.g. with custom budgets in tests
    #[must_use]
    pub fn with_rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    /// The effective configuration
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// The validated base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The admission-control state, for status-polling observers
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Drop the cached CSRF token; used on logout and account switch
    pub async fn clear_csrf_token(&self) {
        self.csrf.clear_token().await;
    }

    /// True if an anti-forgery token is cached and still valid
    pub async fn has_valid_csrf_token(&self) -> bool {
        self.csrf.has_valid_token().await
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        self.request(Method::GET, endpoint, RequestOptions::new())
            .await
    }

    /// Make a GET request with options
    pub async fn get_with_options<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T> {
        self.request(Method::GET, endpoint, options).await
    }

    /// Make a POST request with a JSON body
    pub async fn post<T: DeserializeOwned>(&self, endpoint: &str, body: JsonValue) -> Result<T> {
        self.request(Method::POST, endpoint, RequestOptions::new().json(body))
            .await
    }

    /// Make a PUT request with a JSON body
    pub async fn put<T: DeserializeOwned>(&self, endpoint: &str, body: JsonValue) -> Result<T> {
        self.request(Method::PUT, endpoint, RequestOptions::new().json(body))
            .await
    }

    /// Make a PATCH request with a JSON body
    pub async fn patch<T: DeserializeOwned>(&self, endpoint: &str, body: JsonValue) -> Result<T> {
        self.request(Method::PATCH, endpoint, RequestOptions::new().json(body))
            .await
    }

    /// Make a DELETE request
    pub async fn delete<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        self.request(Method::DELETE, endpoint, RequestOptions::new())
            .await
    }

    /// Make a request and decode the JSON response.
    ///
    /// Admission and CSRF augmentation run once per attempt: a retried
    /// attempt re-checks the rate limit and re-fetches the anti-forgery
    /// headers, since the token may have rotated between attempts.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T> {
        let endpoint = validate_endpoint(endpoint)?;
        let url = self.build_url(&endpoint);
        let limit_key = categorize(method, &endpoint);
        let timeout = options.timeout.unwrap_or(self.config.timeout);

        let mut last_error = None;

        for attempt in 1..=self.config.retry_attempts {
            if attempt > 1 {
                let delay = self.backoff_delay(attempt - 1);
                debug!(%method, %endpoint, attempt, ?delay, "retrying after backoff");
                tokio::time::sleep(delay).await;
            }

            // Admission denial is immediate and final; the caller decides
            // whether to come back after the window resets.
            let admission = self.rate_limiter.check(&limit_key);
            if !admission.is_allowed {
                return Err(Error::RateLimited {
                    retry_after_ms: admission.time_until_reset.as_millis() as u64,
                });
            }
            // Record before the first await point so a concurrent request
            // cannot claim the same remaining slot.
            self.rate_limiter.record(&limit_key);

            let mut request = self.client.request(method.into(), &url).timeout(timeout);

            for (key, value) in &options.headers {
                request = request.header(key.as_str(), value.as_str());
            }
            if !options.query.is_empty() {
                request = request.query(&options.query);
            }
            if let Some(body) = &options.body {
                request = request.json(body);
            }

            if method.is_mutating() {
                // Degraded but not fatal: the request still goes out and the
                // server decides whether to reject it without the header.
                match self.csrf.headers().await {
                    Ok(headers) => request = request.headers(headers),
                    Err(err) => {
                        warn!(%method, %endpoint, error = %err,
                            "sending request without anti-forgery header");
                    }
                }
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        match response.text().await {
                            Ok(text) => {
                                debug!(%method, %endpoint, status = status.as_u16(), "request succeeded");
                                return decode_body(&text, status.as_u16());
                            }
                            Err(err) => {
                                // Connection dropped mid-body; same class as
                                // any other transport failure.
                                warn!(%method, %endpoint, attempt, error = %err,
                                    "response body read failed");
                                last_error = Some(Error::Http(err));
                            }
                        }
                    } else if status.is_server_error() {
                        let body = read_error_body(response).await;
                        warn!(%method, %endpoint, attempt, status = status.as_u16(), "server error");
                        last_error = Some(Error::http_status(status.as_u16(), body));
                    } else {
                        let body = read_error_body(response).await;
                        return Err(Error::http_status(status.as_u16(), body));
                    }
                }
                Err(err) if err.is_timeout() => {
                    warn!(%method, %endpoint, attempt,
                        timeout_ms = timeout.as_millis() as u64, "request timed out");
                    last_error = Some(Error::Timeout {
                        timeout_ms: timeout.as_millis() as u64,
                    });
                }
                Err(err) => {
                    warn!(%method, %endpoint, attempt, error = %err, "transport failure");
                    last_error = Some(Error::Http(err));
                }
            }
        }

        Err(last_error.unwrap_or(Error::MaxRetriesExceeded {
            attempts: self.config.retry_attempts,
        }))
    }

    /// Resolve an already-validated endpoint against the base URL
    fn build_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), endpoint)
    }

    /// Backoff before the next attempt after `failed_attempts` failures:
    /// `retry_delay * 2^(failed_attempts - 1)`, capped
    pub fn backoff_delay(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1).min(16);
        let factor = 2u32.saturating_pow(exponent);
        std::cmp::min(self.config.retry_delay * factor, MAX_RETRY_BACKOFF)
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Decode a success body; empty bodies decode as JSON `null`
fn decode_body<T: DeserializeOwned>(text: &str, status: u16) -> Result<T> {
    let payload = if text.trim().is_empty() { "null" } else { text };
    serde_json::from_str(payload)
        .map_err(|err| Error::decode(format!("invalid JSON in HTTP {status} response: {err}")))
}

/// Read an error body, falling back to the canonical status reason
async fn read_error_body(response: reqwest::Response) -> String {
    let reason = response
        .status()
        .canonical_reason()
        .unwrap_or_default()
        .to_string();
    match response.text().await {
        Ok(body) if !body.is_empty() => body,
        _ => reason,
    }
}

/// Local-development hosts allowed to use plain HTTP
fn is_local_host(host: &str) -> bool {
    // 10.0.2.2 is the Android emulator's alias for the host machine.
    matches!(
        host,
        "localhost" | "127.0.0.1" | "0.0.0.0" | "::1" | "[::1]" | "10.0.2.2"
    )
}

/// Validate the base URL at construction time
fn validate_base_url(raw: &str) -> Result<Url> {
    if raw.trim().is_empty() {
        return Err(Error::config("base URL must not be empty"));
    }
    if raw.chars().any(char::is_whitespace) {
        return Err(Error::config("base URL must not contain whitespace"));
    }
    if raw.contains("..") {
        return Err(Error::config("base URL must not contain traversal sequences"));
    }

    let url = Url::parse(raw)?;
    let host = url
        .host_str()
        .map(str::to_owned)
        .ok_or_else(|| Error::config("base URL must include a host"))?;

    match url.scheme() {
        "https" => {}
        "http" if is_local_host(&host) => {}
        "http" => {
            return Err(Error::config(
                "base URL must use https outside local development",
            ));
        }
        other => {
            return Err(Error::config(format!("unsupported URL scheme '{other}'")));
        }
    }

    Ok(url)
}

/// Validate timeout and retry settings at construction time
fn validate_limits(config: &ApiConfig) -> Result<()> {
    if config.timeout.is_zero() {
        return Err(Error::invalid_value("timeout", "must be greater than zero"));
    }
    if config.timeout > Duration::from_secs(300) {
        return Err(Error::invalid_value("timeout", "must be at most 300s"));
    }
    if config.retry_attempts == 0 {
        return Err(Error::invalid_value(
            "retry_attempts",
            "must allow at least one attempt",
        ));
    }
    if config.retry_attempts > 10 {
        return Err(Error::invalid_value(
            "retry_attempts",
            "must be at most 10",
        ));
    }
    if config.retry_delay.is_zero() {
        return Err(Error::invalid_value(
            "retry_delay",
            "must be greater than zero",
        ));
    }
    if config.retry_delay > Duration::from_secs(60) {
        return Err(Error::invalid_value("retry_delay", "must be at most 60s"));
    }
    Ok(())
}

/// Validate and normalize an endpoint path.
///
/// A missing leading `/` is added rather than rejected; traversal segments
/// and embedded whitespace are stripped.
fn validate_endpoint(endpoint: &str) -> Result<String> {
    if endpoint.trim().is_empty() {
        return Err(Error::validation("endpoint must be a non-empty path"));
    }
    let sanitized = sanitize_for_url(endpoint);
    if sanitized.is_empty() {
        return Err(Error::validation(format!(
            "endpoint '{endpoint}' resolves to an empty path"
        )));
    }
    Ok(format!("/{sanitized}"))
}

/// Strip traversal segments and embedded whitespace from a path
pub fn sanitize_for_url(input: &str) -> String {
    input
        .replace('\\', "/")
        .split('/')
        .map(|segment| {
            segment
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
        })
        .filter(|segment| !segment.is_empty() && segment != "." && segment != "..")
        .collect::<Vec<_>>()
        .join("/")
}
