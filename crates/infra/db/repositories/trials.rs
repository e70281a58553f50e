use anyhow::Result;
use async_trait::async_trait;
use diesel::prelude::*;
use std::sync::Arc;

use crate::domain;
use crate::infra::db::postgres::{postgres_connection::PgPoolSquad, schema::trial_records};
use domain::{entities::trial_records::TrialRecordEntity, repositories::trials::TrialRepository};

pub struct TrialPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl TrialPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl TrialRepository for TrialPostgres {
    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<TrialRecordEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let record = trial_records::table
            .find(user_id)
            .select(TrialRecordEntity::as_select())
            .first::<TrialRecordEntity>(&mut conn)
            .optional()?;

        Ok(record)
    }

    async fn insert_if_absent(&self, record: TrialRecordEntity) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let inserted = diesel::insert_into(trial_records::table)
            .values(&record)
            .on_conflict_do_nothing()
            .execute(&mut conn)?;

        Ok(inserted > 0)
    }

    async fn delete(&self, user_id: &str) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        diesel::delete(trial_records::table.find(user_id)).execute(&mut conn)?;

        Ok(())
    }
}
