use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{prelude::*, upsert::excluded};
use std::sync::Arc;

use crate::domain;
use crate::infra::db::postgres::{postgres_connection::PgPoolSquad, schema::verification_codes};
use domain::{
    entities::verification_codes::VerificationCodeEntity,
    repositories::verification_codes::VerificationCodeRepository,
    value_objects::enums::verification_purposes::VerificationPurpose,
};

pub struct VerificationCodePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl VerificationCodePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl VerificationCodeRepository for VerificationCodePostgres {
    async fn upsert(&self, code: VerificationCodeEntity) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        diesel::insert_into(verification_codes::table)
            .values(&code)
            .on_conflict((verification_codes::purpose, verification_codes::identifier))
            .do_update()
            .set((
                verification_codes::code.eq(excluded(verification_codes::code)),
                verification_codes::created_at.eq(excluded(verification_codes::created_at)),
                verification_codes::expires_at.eq(excluded(verification_codes::expires_at)),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn find_live(
        &self,
        purpose: VerificationPurpose,
        identifier: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<VerificationCodeEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let code = verification_codes::table
            .filter(verification_codes::purpose.eq(purpose.as_str()))
            .filter(verification_codes::identifier.eq(identifier))
            .filter(verification_codes::expires_at.gt(now))
            .select(VerificationCodeEntity::as_select())
            .first::<VerificationCodeEntity>(&mut conn)
            .optional()?;

        Ok(code)
    }

    async fn consume(
        &self,
        purpose: VerificationPurpose,
        identifier: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let deleted = diesel::delete(
            verification_codes::table
                .filter(verification_codes::purpose.eq(purpose.as_str()))
                .filter(verification_codes::identifier.eq(identifier))
                .filter(verification_codes::code.eq(code))
                .filter(verification_codes::expires_at.gt(now)),
        )
        .execute(&mut conn)?;

        Ok(deleted > 0)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let purged =
            diesel::delete(verification_codes::table.filter(verification_codes::expires_at.le(now)))
                .execute(&mut conn)?;

        Ok(purged)
    }
}
