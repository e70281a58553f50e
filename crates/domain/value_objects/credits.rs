use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::{credit_usage_history::UsageHistoryEntity, user_credits::UserCreditsEntity},
    value_objects::enums::{ledger_keys::LedgerKey, request_types::RequestType},
};

/// Float noise tolerated when comparing a balance against a cost.
pub const BALANCE_EPSILON: f64 = 1e-9;

/// Remaining units per ledger key. Keys that are absent read as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CreditBalances(BTreeMap<LedgerKey, f64>);

impl CreditBalances {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every ledger key present with a zero balance.
    pub fn zeroed() -> Self {
        LedgerKey::ALL.iter().map(|key| (*key, 0.0)).collect()
    }

    pub fn with(mut self, key: LedgerKey, amount: f64) -> Self {
        self.set(key, amount);
        self
    }

    pub fn get(&self, key: LedgerKey) -> f64 {
        self.0.get(&key).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, key: LedgerKey, amount: f64) {
        self.0.insert(key, amount);
    }

    pub fn add(&mut self, other: &CreditBalances) {
        for (key, amount) in other.iter() {
            *self.0.entry(key).or_insert(0.0) += amount;
        }
    }

    pub fn covers(&self, key: LedgerKey, cost: f64) -> bool {
        self.get(key) + BALANCE_EPSILON >= cost
    }

    pub fn is_depleted(&self) -> bool {
        self.0.values().all(|amount| *amount <= BALANCE_EPSILON)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (LedgerKey, f64)> + '_ {
        self.0.iter().map(|(key, amount)| (*key, *amount))
    }
}

impl FromIterator<(LedgerKey, f64)> for CreditBalances {
    fn from_iter<I: IntoIterator<Item = (LedgerKey, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserCreditsDto {
    pub user_id: String,
    #[serde(flatten)]
    pub balances: CreditBalances,
    pub purchased_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserCreditsEntity> for UserCreditsDto {
    fn from(value: UserCreditsEntity) -> Self {
        Self {
            user_id: value.user_id,
            balances: value.balances,
            purchased_at: value.purchased_at,
            expired_at: value.expired_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageHistoryDto {
    pub id: Uuid,
    pub ledger: String,
    pub amount: f64,
    pub request_type: String,
    pub provider_request_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<UsageHistoryEntity> for UsageHistoryDto {
    fn from(value: UsageHistoryEntity) -> Self {
        Self {
            id: value.id,
            ledger: value.ledger,
            amount: value.amount,
            request_type: value.request_type,
            provider_request_id: value.provider_request_id,
            created_at: value.created_at,
        }
    }
}

/// One conditional subtraction plus its history row.
#[derive(Debug, Clone, PartialEq)]
pub struct DebitRequest {
    pub user_id: String,
    pub ledger: LedgerKey,
    pub amount: f64,
    pub request_type: RequestType,
    pub provider_request_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DebitOutcome {
    Applied {
        entry: UsageHistoryEntity,
        remaining: f64,
    },
    /// The balance could not cover the amount at write time; nothing was written.
    Insufficient,
}
