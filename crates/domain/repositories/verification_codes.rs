use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;

use crate::domain::{
    entities::verification_codes::VerificationCodeEntity,
    value_objects::enums::verification_purposes::VerificationPurpose,
};

#[automock]
#[async_trait]
pub trait VerificationCodeRepository {
    /// Stores the code, replacing any live code for the same key.
    async fn upsert(&self, code: VerificationCodeEntity) -> Result<()>;

    async fn find_live(
        &self,
        purpose: VerificationPurpose,
        identifier: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<VerificationCodeEntity>>;

    /// Deletes the entry only when `code` matches and it has not expired.
    /// Returns whether an entry was consumed.
    async fn consume(
        &self,
        purpose: VerificationPurpose,
        identifier: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}
