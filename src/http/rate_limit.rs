//! Client-side rate limiting
//!
//! Sliding-window admission control per logical endpoint key. Purely local
//! and synchronous: answers "is this call allowed right now" without any
//! network I/O, independent of whatever limits the server enforces.
//!
//! Exact request timestamps are retained per key and pruned lazily on
//! access, so admission is precise rather than bucket-approximate, at O(k)
//! prune cost per check for k in-window timestamps.

use crate::types::Method;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Key for state-changing budget endpoints
pub const BUDGET_MODIFICATION: &str = "budget_modification";

/// Key for budget read endpoints
pub const BUDGET_READ: &str = "budget_read";

/// Key for the aggregated overview endpoint
pub const BUDGET_OVERVIEW: &str = "budget_overview";

/// Admission budget for one endpoint category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests admitted per window
    pub max_requests: usize,
    /// Trailing window length
    pub window: Duration,
}

impl RateLimitConfig {
    /// Create a new budget
    pub const fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }
}

/// Conservative budget applied to keys with no configured category
pub const DEFAULT_LIMIT: RateLimitConfig = RateLimitConfig::new(30, Duration::from_millis(60_000));

/// Static admission table, keyed by endpoint category
static RATE_LIMITS: Lazy<HashMap<&'static str, RateLimitConfig>> = Lazy::new(|| {
    HashMap::from([
        (
            BUDGET_MODIFICATION,
            RateLimitConfig::new(30, Duration::from_millis(60_000)),
        ),
        (
            BUDGET_READ,
            RateLimitConfig::new(100, Duration::from_millis(60_000)),
        ),
        (
            BUDGET_OVERVIEW,
            RateLimitConfig::new(200, Duration::from_millis(60_000)),
        ),
    ])
});

/// Read-only admission snapshot for one key, computed at query time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    /// Whether the next request would be admitted
    pub is_allowed: bool,
    /// Requests left in the current window
    pub remaining_requests: usize,
    /// Time until the oldest in-window request ages out
    pub time_until_reset: Duration,
}

/// Sliding-window rate limiter keyed by logical endpoint
pub struct RateLimiter {
    /// Per-instance overrides; keys not found here fall back to the static
    /// table, then to [`DEFAULT_LIMIT`]
    limits: HashMap<String, RateLimitConfig>,
    windows: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    /// Create a limiter using the static admission table
    pub fn new() -> Self {
        Self::with_config(HashMap::new())
    }

    /// Create a limiter with per-key budget overrides
    pub fn with_config(limits: HashMap<String, RateLimitConfig>) -> Self {
        Self {
            limits,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Compute the admission status for `key` without recording anything.
    ///
    /// Prunes timestamps that have aged out of the window, then reports
    /// whether one more request fits the budget. Never fails: an unknown
    /// key degrades to the default budget.
    pub fn check(&self, key: &str) -> RateLimitStatus {
        let config = self.config_for(key);
        let now = Instant::now();

        let mut windows = self.windows();
        let window = windows.entry(key.to_string()).or_default();
        window.retain(|stamp| now.duration_since(*stamp) < config.window);

        let count = window.len();
        let time_until_reset = window
            .first()
            .map(|oldest| config.window.saturating_sub(now.duration_since(*oldest)))
            .unwrap_or(Duration::ZERO);

        RateLimitStatus {
            is_allowed: count < config.max_requests,
            remaining_requests: config.max_requests.saturating_sub(count),
            time_until_reset,
        }
    }

    /// Record one admitted request against `key`.
    ///
    /// Must be called synchronously after an allowed [`check`](Self::check),
    /// before any await point, so two in-flight requests cannot both pass
    /// `check` against the same remaining slot.
    pub fn record(&self, key: &str) {
        let mut windows = self.windows();
        windows
            .entry(key.to_string())
            .or_default()
            .push(Instant::now());
    }

    /// True if `key` has at least one request inside its window.
    ///
    /// Observer hook for status-polling callers; plays no part in the
    /// admission decision.
    pub fn has_recent_activity(&self, key: &str) -> bool {
        let config = self.config_for(key);
        let now = Instant::now();

        let mut windows = self.windows();
        match windows.get_mut(key) {
            Some(window) => {
                window.retain(|stamp| now.duration_since(*stamp) < config.window);
                !window.is_empty()
            }
            None => false,
        }
    }

    /// Drop all recorded windows
    pub fn reset(&self) {
        self.windows().clear();
    }

    fn config_for(&self, key: &str) -> RateLimitConfig {
        if let Some(config) = self.limits.get(key) {
            return *config;
        }
        RATE_LIMITS.get(key).copied().unwrap_or(DEFAULT_LIMIT)
    }

    fn windows(&self) -> MutexGuard<'_, HashMap<String, Vec<Instant>>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("overrides", &self.limits.len())
            .finish_non_exhaustive()
    }
}

/// Map an endpoint path and method to its rate-limit key.
///
/// `/budgets/overview` has its own budget; other `/budgets` paths split by
/// whether the method mutates. Anything else keeps a per-path window at the
/// default budget.
pub fn categorize(method: Method, endpoint: &str) -> String {
    if endpoint.starts_with("/budgets/overview") {
        BUDGET_OVERVIEW.to_string()
    } else if endpoint.starts_with("/budgets") {
        if method.is_mutating() {
            BUDGET_MODIFICATION.to_string()
        } else {
            BUDGET_READ.to_string()
        }
    } else {
        endpoint.to_string()
    }
}
