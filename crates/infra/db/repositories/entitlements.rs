use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{define_sql_function, prelude::*, sql_types::Double, upsert::excluded};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{credit_balances, credit_usage_history, user_credits},
    },
};
use domain::{
    entities::{
        credit_usage_history::{InsertUsageHistoryEntity, UsageHistoryEntity},
        user_credits::{CreditBalanceRow, UserCreditsEntity, UserCreditsRow},
    },
    repositories::entitlements::EntitlementRepository,
    value_objects::{
        credits::{BALANCE_EPSILON, CreditBalances, DebitOutcome, DebitRequest},
        enums::ledger_keys::LedgerKey,
    },
};

define_sql_function!(fn greatest(a: Double, b: Double) -> Double);

pub struct EntitlementPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl EntitlementPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

enum BalanceWrite {
    Replace,
    Add,
}

fn load_entity(conn: &mut PgConnection, user_id: &str) -> QueryResult<Option<UserCreditsEntity>> {
    let row = user_credits::table
        .find(user_id)
        .select(UserCreditsRow::as_select())
        .first::<UserCreditsRow>(conn)
        .optional()?;

    let Some(row) = row else {
        return Ok(None);
    };

    let balances = credit_balances::table
        .filter(credit_balances::user_id.eq(user_id))
        .select(CreditBalanceRow::as_select())
        .load::<CreditBalanceRow>(conn)?;

    Ok(Some(UserCreditsEntity::from_rows(row, balances)))
}

fn load_existing(conn: &mut PgConnection, user_id: &str) -> QueryResult<UserCreditsEntity> {
    load_entity(conn, user_id)?.ok_or(diesel::result::Error::NotFound)
}

fn write_balances(
    conn: &mut PgConnection,
    user_id: &str,
    grants: &CreditBalances,
    mode: BalanceWrite,
    now: DateTime<Utc>,
) -> QueryResult<()> {
    for key in LedgerKey::ALL {
        let row = CreditBalanceRow {
            user_id: user_id.to_string(),
            ledger: key.as_str().to_string(),
            remaining: grants.get(key),
            updated_at: now,
        };

        let insert = diesel::insert_into(credit_balances::table)
            .values(&row)
            .on_conflict((credit_balances::user_id, credit_balances::ledger))
            .do_update();

        match mode {
            BalanceWrite::Replace => insert
                .set((
                    credit_balances::remaining.eq(excluded(credit_balances::remaining)),
                    credit_balances::updated_at.eq(now),
                ))
                .execute(conn)?,
            BalanceWrite::Add => insert
                .set((
                    credit_balances::remaining
                        .eq(credit_balances::remaining + excluded(credit_balances::remaining)),
                    credit_balances::updated_at.eq(now),
                ))
                .execute(conn)?,
        };
    }

    Ok(())
}

#[async_trait]
impl EntitlementRepository for EntitlementPostgres {
    async fn find_by_user_id(&self, user_id: &str) -> Result<Option<UserCreditsEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let entity = load_entity(&mut conn, user_id)?;

        Ok(entity)
    }

    async fn reset_balances(
        &self,
        user_id: &str,
        grants: CreditBalances,
        purchased_at: Option<DateTime<Utc>>,
        expired_at: Option<DateTime<Utc>>,
    ) -> Result<UserCreditsEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let now = Utc::now();

        let entity = conn.transaction::<UserCreditsEntity, diesel::result::Error, _>(|conn| {
            let row = UserCreditsRow {
                user_id: user_id.to_string(),
                purchased_at,
                expired_at,
                created_at: now,
                updated_at: now,
            };

            diesel::insert_into(user_credits::table)
                .values(&row)
                .on_conflict(user_credits::user_id)
                .do_update()
                .set((
                    user_credits::purchased_at.eq(purchased_at),
                    user_credits::expired_at.eq(expired_at),
                    user_credits::updated_at.eq(now),
                ))
                .execute(conn)?;

            write_balances(conn, user_id, &grants, BalanceWrite::Replace, now)?;

            load_existing(conn, user_id)
        })?;

        Ok(entity)
    }

    async fn add_balances(
        &self,
        user_id: &str,
        grants: CreditBalances,
        purchased_at: Option<DateTime<Utc>>,
    ) -> Result<UserCreditsEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let now = Utc::now();

        let entity = conn.transaction::<UserCreditsEntity, diesel::result::Error, _>(|conn| {
            let row = UserCreditsRow {
                user_id: user_id.to_string(),
                purchased_at,
                expired_at: None,
                created_at: now,
                updated_at: now,
            };

            diesel::insert_into(user_credits::table)
                .values(&row)
                .on_conflict(user_credits::user_id)
                .do_update()
                .set(user_credits::updated_at.eq(now))
                .execute(conn)?;

            // A top-up on a lapsed record clears the stale expiry so the next
            // expiry check keeps the purchased balance.
            diesel::update(
                user_credits::table
                    .find(user_id)
                    .filter(user_credits::expired_at.le(now)),
            )
            .set(user_credits::expired_at.eq(None::<DateTime<Utc>>))
            .execute(conn)?;

            write_balances(conn, user_id, &grants, BalanceWrite::Add, now)?;

            load_existing(conn, user_id)
        })?;

        Ok(entity)
    }

    async fn zero_balances(
        &self,
        user_id: &str,
        expired_at: Option<DateTime<Utc>>,
    ) -> Result<UserCreditsEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let now = Utc::now();

        let entity = conn.transaction::<UserCreditsEntity, diesel::result::Error, _>(|conn| {
            let row = UserCreditsRow {
                user_id: user_id.to_string(),
                purchased_at: None,
                expired_at,
                created_at: now,
                updated_at: now,
            };

            let upsert = diesel::insert_into(user_credits::table)
                .values(&row)
                .on_conflict(user_credits::user_id)
                .do_update();

            match expired_at {
                Some(expired_at) => upsert
                    .set((
                        user_credits::expired_at.eq(Some(expired_at)),
                        user_credits::updated_at.eq(now),
                    ))
                    .execute(conn)?,
                None => upsert.set(user_credits::updated_at.eq(now)).execute(conn)?,
            };

            write_balances(
                conn,
                user_id,
                &CreditBalances::zeroed(),
                BalanceWrite::Replace,
                now,
            )?;

            load_existing(conn, user_id)
        })?;

        Ok(entity)
    }

    async fn insert_if_absent(
        &self,
        user_id: &str,
        grants: CreditBalances,
        expired_at: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let now = Utc::now();

        let created = conn.transaction::<bool, diesel::result::Error, _>(|conn| {
            let row = UserCreditsRow {
                user_id: user_id.to_string(),
                purchased_at: Some(now),
                expired_at,
                created_at: now,
                updated_at: now,
            };

            let inserted = diesel::insert_into(user_credits::table)
                .values(&row)
                .on_conflict_do_nothing()
                .execute(conn)?;

            if inserted == 0 {
                return Ok(false);
            }

            write_balances(conn, user_id, &grants, BalanceWrite::Replace, now)?;

            Ok(true)
        })?;

        Ok(created)
    }

    async fn debit(&self, request: DebitRequest) -> Result<DebitOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let now = Utc::now();

        let outcome = conn.transaction::<DebitOutcome, diesel::result::Error, _>(|conn| {
            // The row lock taken by UPDATE serializes concurrent debits; the
            // WHERE clause is re-checked against the latest committed balance.
            let remaining = diesel::update(
                credit_balances::table
                    .filter(credit_balances::user_id.eq(&request.user_id))
                    .filter(credit_balances::ledger.eq(request.ledger.as_str()))
                    .filter((credit_balances::remaining + BALANCE_EPSILON).ge(request.amount)),
            )
            .set((
                credit_balances::remaining
                    .eq(greatest(credit_balances::remaining - request.amount, 0.0)),
                credit_balances::updated_at.eq(now),
            ))
            .returning(credit_balances::remaining)
            .get_result::<f64>(conn)
            .optional()?;

            let Some(remaining) = remaining else {
                return Ok(DebitOutcome::Insufficient);
            };

            let insert_entity = InsertUsageHistoryEntity {
                id: Uuid::new_v4(),
                user_id: request.user_id.clone(),
                ledger: request.ledger.as_str().to_string(),
                amount: request.amount,
                request_type: request.request_type.as_str().to_string(),
                provider_request_id: request.provider_request_id.clone(),
                created_at: now,
            };

            let entry = diesel::insert_into(credit_usage_history::table)
                .values(&insert_entity)
                .returning(UsageHistoryEntity::as_returning())
                .get_result::<UsageHistoryEntity>(conn)?;

            Ok(DebitOutcome::Applied { entry, remaining })
        })?;

        Ok(outcome)
    }

    async fn list_usage_history(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<UsageHistoryEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = credit_usage_history::table
            .filter(credit_usage_history::user_id.eq(user_id))
            .order(credit_usage_history::created_at.desc())
            .limit(limit)
            .select(UsageHistoryEntity::as_select())
            .load::<UsageHistoryEntity>(&mut conn)?;

        Ok(rows)
    }

    async fn delete_user_data(&self, user_id: &str) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        conn.transaction::<(), diesel::result::Error, _>(|conn| {
            diesel::delete(
                credit_usage_history::table.filter(credit_usage_history::user_id.eq(user_id)),
            )
            .execute(conn)?;
            diesel::delete(credit_balances::table.filter(credit_balances::user_id.eq(user_id)))
                .execute(conn)?;
            diesel::delete(user_credits::table.find(user_id)).execute(conn)?;
            Ok(())
        })?;

        Ok(())
    }
}
