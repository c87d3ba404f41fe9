//! Typed wrappers over the budget endpoints
//!
//! Thin by design: every call flows through [`ApiClient`], which owns
//! validation, admission control, CSRF augmentation, and retry. Nothing
//! here adds policy of its own.

use super::models::{
    Budget, BudgetOverview, BudgetUpdate, Category, NewBudget, NewSpendingEntry, SpendingEntry,
};
use crate::error::{Error, Result};
use crate::http::{ApiClient, ApiConfig};
use crate::types::JsonValue;
use tracing::debug;

/// Typed client for the Ledgerline budget API
#[derive(Debug)]
pub struct BudgetApi {
    client: ApiClient,
}

impl BudgetApi {
    /// Create an API client from configuration
    pub fn new(config: ApiConfig) -> Result<Self> {
        Ok(Self {
            client: ApiClient::new(config)?,
        })
    }

    /// Wrap an already-constructed HTTP client
    pub fn from_client(client: ApiClient) -> Self {
        Self { client }
    }

    /// The underlying HTTP client
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Fetch all budgets
    pub async fn list_budgets(&self) -> Result<Vec<Budget>> {
        self.client.get("/budgets").await
    }

    /// Fetch a single budget
    pub async fn get_budget(&self, id: i64) -> Result<Budget> {
        self.client.get(&format!("/budgets/{id}")).await
    }

    /// Fetch the aggregated overview
    pub async fn overview(&self) -> Result<BudgetOverview> {
        self.client.get("/budgets/overview").await
    }

    /// Create a budget
    pub async fn create_budget(&self, budget: &NewBudget) -> Result<Budget> {
        self.client
            .post("/budgets", serde_json::to_value(budget).map_err(to_encode_error)?)
            .await
    }

    /// Apply a partial update to a budget
    pub async fn update_budget(&self, id: i64, update: &BudgetUpdate) -> Result<Budget> {
        self.client
            .put(
                &format!("/budgets/{id}"),
                serde_json::to_value(update).map_err(to_encode_error)?,
            )
            .await
    }

    /// Delete a budget
    pub async fn delete_budget(&self, id: i64) -> Result<()> {
        let _: JsonValue = self.client.delete(&format!("/budgets/{id}")).await?;
        Ok(())
    }

    /// Fetch the spending entries recorded against a budget
    pub async fn spending(&self, budget_id: i64) -> Result<Vec<SpendingEntry>> {
        self.client
            .get(&format!("/budgets/{budget_id}/spending"))
            .await
    }

    /// Record an expense against a budget
    pub async fn record_spending(
        &self,
        budget_id: i64,
        entry: &NewSpendingEntry,
    ) -> Result<SpendingEntry> {
        self.client
            .post(
                &format!("/budgets/{budget_id}/spending"),
                serde_json::to_value(entry).map_err(to_encode_error)?,
            )
            .await
    }

    /// Fetch all spending categories
    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        self.client.get("/categories").await
    }

    /// End the session.
    ///
    /// The cached CSRF token is dropped whether or not the logout call
    /// succeeds; the next account must never reuse it.
    pub async fn logout(&self) -> Result<()> {
        let result: Result<JsonValue> = self.client.post("/auth/logout", JsonValue::Null).await;
        self.client.clear_csrf_token().await;
        debug!("session closed, CSRF token cleared");
        result.map(|_| ())
    }
}

fn to_encode_error(err: serde_json::Error) -> Error {
    Error::decode(format!("failed to encode request body: {err}"))
}
