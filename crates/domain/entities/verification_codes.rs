use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::infra::db::postgres::schema::verification_codes;

/// Live code for `(purpose, identifier)`; at most one exists per key.
#[derive(Debug, Clone, PartialEq, Selectable, Queryable, Insertable)]
#[diesel(table_name = verification_codes)]
pub struct VerificationCodeEntity {
    pub purpose: String,
    pub identifier: String,
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl VerificationCodeEntity {
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}
