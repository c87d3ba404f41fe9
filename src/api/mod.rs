//! Typed budget API surface
//!
//! Serde models for the budget payloads and thin typed wrappers over the
//! endpoints the application consumes.

mod budgets;
mod models;

pub use budgets::BudgetApi;
pub use models::{
    Budget, BudgetOverview, BudgetPeriod, BudgetSummary, BudgetUpdate, Category, NewBudget,
    NewSpendingEntry, SpendingEntry,
};
