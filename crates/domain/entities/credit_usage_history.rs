use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::credit_usage_history;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = credit_usage_history)]
pub struct UsageHistoryEntity {
    pub id: Uuid,
    pub user_id: String,
    pub ledger: String,
    pub amount: f64,
    pub request_type: String,
    pub provider_request_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = credit_usage_history)]
pub struct InsertUsageHistoryEntity {
    pub id: Uuid,
    pub user_id: String,
    pub ledger: String,
    pub amount: f64,
    pub request_type: String,
    pub provider_request_id: Option<String>,
    pub created_at: DateTime<Utc>,
}
