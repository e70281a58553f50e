use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::infra::db::postgres::schema::trial_records;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable, Insertable)]
#[diesel(table_name = trial_records)]
#[diesel(primary_key(user_id))]
pub struct TrialRecordEntity {
    pub user_id: String,
    pub email: String,
    pub expired_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
