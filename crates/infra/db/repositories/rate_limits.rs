use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{prelude::*, sql_types::Text};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain;
use crate::infra::db::postgres::{postgres_connection::PgPoolSquad, schema::rate_limit_hits};
use domain::{
    repositories::rate_limits::RateLimitRepository,
    value_objects::{enums::rate_limit_scopes::RateLimitScope, rate_limits::RateLimitPolicy},
};

pub struct RateLimitPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl RateLimitPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl RateLimitRepository for RateLimitPostgres {
    async fn try_acquire(
        &self,
        scope: RateLimitScope,
        subject: &str,
        policy: RateLimitPolicy,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let window_start = now - policy.period;

        let lock_key = format!("{}:{}", scope.as_str(), subject);

        let acquired = conn.transaction::<bool, diesel::result::Error, _>(|conn| {
            // Serializes attempts per subject, including the very first one
            // when no rows exist to lock yet.
            diesel::sql_query("SELECT pg_advisory_xact_lock(hashtext($1))")
                .bind::<Text, _>(&lock_key)
                .execute(conn)?;

            diesel::delete(
                rate_limit_hits::table
                    .filter(rate_limit_hits::scope.eq(scope.as_str()))
                    .filter(rate_limit_hits::subject.eq(subject))
                    .filter(rate_limit_hits::hit_at.le(window_start)),
            )
            .execute(conn)?;

            let accepted = rate_limit_hits::table
                .filter(rate_limit_hits::scope.eq(scope.as_str()))
                .filter(rate_limit_hits::subject.eq(subject))
                .select(rate_limit_hits::hit_at)
                .load::<DateTime<Utc>>(conn)?;

            if !policy.allows(&accepted, now) {
                return Ok(false);
            }

            diesel::insert_into(rate_limit_hits::table)
                .values((
                    rate_limit_hits::id.eq(Uuid::new_v4()),
                    rate_limit_hits::scope.eq(scope.as_str()),
                    rate_limit_hits::subject.eq(subject),
                    rate_limit_hits::hit_at.eq(now),
                ))
                .execute(conn)?;

            Ok(true)
        })?;

        Ok(acquired)
    }

    async fn purge_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let purged =
            diesel::delete(rate_limit_hits::table.filter(rate_limit_hits::hit_at.le(cutoff)))
                .execute(&mut conn)?;

        Ok(purged)
    }
}
