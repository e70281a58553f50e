use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::{
    domain::value_objects::{credits::CreditBalances, enums::ledger_keys::LedgerKey},
    infra::db::postgres::schema::{credit_balances, user_credits},
};

#[derive(Debug, Clone, PartialEq)]
pub struct UserCreditsEntity {
    pub user_id: String,
    pub balances: CreditBalances,
    pub purchased_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserCreditsEntity {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expired_at, Some(expired_at) if expired_at <= now)
    }

    /// Assembles the entity from its row and balance rows. Unknown ledger
    /// names are skipped.
    pub fn from_rows(row: UserCreditsRow, balances: Vec<CreditBalanceRow>) -> Self {
        let balances = balances
            .into_iter()
            .filter_map(|balance| {
                LedgerKey::from_str(&balance.ledger).map(|key| (key, balance.remaining))
            })
            .collect();

        Self {
            user_id: row.user_id,
            balances,
            purchased_at: row.purchased_at,
            expired_at: row.expired_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Identifiable, Selectable, Queryable, Insertable)]
#[diesel(table_name = user_credits)]
#[diesel(primary_key(user_id))]
pub struct UserCreditsRow {
    pub user_id: String,
    pub purchased_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Selectable, Queryable, Insertable)]
#[diesel(table_name = credit_balances)]
pub struct CreditBalanceRow {
    pub user_id: String,
    pub ledger: String,
    pub remaining: f64,
    pub updated_at: DateTime<Utc>,
}
