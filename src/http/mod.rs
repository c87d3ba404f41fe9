//! HTTP client module
//!
//! The resilient request path: validated configuration, endpoint
//! sanitization, sliding-window admission control, CSRF augmentation for
//! mutating methods, and bounded retry with exponential backoff.

mod client;
mod rate_limit;

pub use client::{
    sanitize_for_url, ApiClient, ApiConfig, RequestOptions, DEFAULT_RETRY_ATTEMPTS,
    DEFAULT_RETRY_DELAY, DEFAULT_TIMEOUT,
};
pub use rate_limit::{
    categorize, RateLimitConfig, RateLimitStatus, RateLimiter, BUDGET_MODIFICATION,
    BUDGET_OVERVIEW, BUDGET_READ, DEFAULT_LIMIT,
};
