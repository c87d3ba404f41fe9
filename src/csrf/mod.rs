//! CSRF token management
//!
//! The manager owns a single cached anti-forgery token, refreshes it from
//! the backend on demand, and coalesces concurrent refreshes into one
//! outstanding request.

mod manager;
mod types;

pub use manager::{CsrfTokenManager, CSRF_TOKEN_HEADER, REQUESTED_WITH_HEADER};
pub use types::{CsrfToken, DEFAULT_TOKEN_TTL_MS};

#[cfg(test)]
mod tests;
