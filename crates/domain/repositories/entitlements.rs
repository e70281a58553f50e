use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;

use crate::domain::{
    entities::{credit_usage_history::UsageHistoryEntity, user_credits::UserCreditsEntity},
    value_objects::credits::{CreditBalances, DebitOutcome, DebitRequest},
};

#[automock]
#[async_trait]
pub trait EntitlementRepository {
    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<UserCreditsEntity>>;

    /// Upserts the record and replaces every balance: keys in `grants` take
    /// the granted amount, all others drop to zero.
    async fn reset_balances(
        &self,
        user_id: &str,
        grants: CreditBalances,
        purchased_at: Option<DateTime<Utc>>,
        expired_at: Option<DateTime<Utc>>,
    ) -> Result<UserCreditsEntity>;

    /// Upserts the record and adds `grants` on top of the current balances.
    async fn add_balances(
        &self,
        user_id: &str,
        grants: CreditBalances,
        purchased_at: Option<DateTime<Utc>>,
    ) -> Result<UserCreditsEntity>;

    /// Upserts the record with every balance at zero. `expired_at` of `None`
    /// keeps the stored expiration.
    async fn zero_balances(
        &self,
        user_id: &str,
        expired_at: Option<DateTime<Utc>>,
    ) -> Result<UserCreditsEntity>;

    /// Creates the record with `grants` only when the user has none yet.
    /// Returns whether it was created.
    async fn insert_if_absent(
        &self,
        user_id: &str,
        grants: CreditBalances,
        expired_at: Option<DateTime<Utc>>,
    ) -> Result<bool>;

    /// Conditionally subtracts and appends the history entry in one transaction.
    async fn debit(&self, request: DebitRequest) -> Result<DebitOutcome>;

    async fn list_usage_history(&self, user_id: &str, limit: i64)
    -> Result<Vec<UsageHistoryEntity>>;

    async fn delete_user_data(&self, user_id: &str) -> Result<()>;
}
