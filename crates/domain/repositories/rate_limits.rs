use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;

use crate::domain::value_objects::{
    enums::rate_limit_scopes::RateLimitScope, rate_limits::RateLimitPolicy,
};

#[automock]
#[async_trait]
pub trait RateLimitRepository {
    /// Records an attempt for `(scope, subject)` when the policy allows it.
    /// Returns false, recording nothing, when the limit is exhausted.
    async fn try_acquire(
        &self,
        scope: RateLimitScope,
        subject: &str,
        policy: RateLimitPolicy,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    /// Deletes every recorded attempt at or before `cutoff`, across all
    /// subjects. Returns the number of rows removed.
    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}
