//! # Ledgerline API Client
//!
//! The secure REST client core of the Ledgerline budget tracker: every
//! backend call flows through one resilient request path.
//!
//! ## Features
//!
//! - **CSRF Protection**: Short-lived anti-forgery tokens, refreshed on
//!   demand with coalesced concurrent refreshes
//! - **Admission Control**: Sliding-window rate limits per endpoint
//!   category, enforced before any network I/O
//! - **Bounded Retry**: Exponential backoff for transient failures, strict
//!   classification of everything else
//! - **Validated Construction**: Base URL and limits checked when the
//!   client is built, not at first request
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ledgerline_client::{ApiConfig, BudgetApi, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let api = BudgetApi::new(ApiConfig::from_env()?)?;
//!
//!     let overview = api.overview().await?;
//!     println!("spent {} of {}", overview.total_spent, overview.total_budgeted);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                       BudgetApi                         │
//! │   typed wrappers: budgets, overview, spending, logout   │
//! └────────────────────────────┬────────────────────────────┘
//!                              │
//! ┌────────────────────────────┴────────────────────────────┐
//! │                        ApiClient                        │
//! │  validate → admit → attach CSRF → execute → classify →  │
//! │                    retry with backoff                   │
//! └──────────┬─────────────────────────────────┬────────────┘
//!            │                                 │
//! ┌──────────┴───────────┐        ┌────────────┴────────────┐
//! │   CsrfTokenManager   │        │       RateLimiter       │
//! │  cached token,       │        │  sliding window per     │
//! │  coalesced refresh   │        │  endpoint category      │
//! └──────────────────────┘        └─────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(missing_docs)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the client
pub mod error;

/// Common types and type aliases
pub mod types;

/// CSRF token management
pub mod csrf;

/// HTTP client with admission control and retry
pub mod http;

/// Typed budget API surface
pub mod api;

// ============================================================================
// Re-exports
// ============================================================================

pub use api::BudgetApi;
pub use error::{Error, Result};
pub use http::{ApiClient, ApiConfig, RequestOptions};
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
