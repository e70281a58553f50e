use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::trial_records::TrialRecordEntity;

#[automock]
#[async_trait]
pub trait TrialRepository {
    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<TrialRecordEntity>>;

    /// Returns false when a record for the user already exists.
    async fn insert_if_absent(&self, record: TrialRecordEntity) -> Result<bool>;

    async fn delete(&self, user_id: &str) -> Result<()>;
}
