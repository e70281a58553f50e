use std::sync::Arc;

use chrono::{DateTime, Utc};
use crates::domain::{
    entities::{credit_usage_history::UsageHistoryEntity, user_credits::UserCreditsEntity},
    repositories::{
        entitlements::EntitlementRepository, identity::IdentityProvider,
        notifications::NotificationSender,
    },
    value_objects::{
        catalog::StorePackageCatalog,
        credits::{CreditBalances, DebitOutcome, DebitRequest, UsageHistoryDto, UserCreditsDto},
        enums::{
            ledger_keys::LedgerKey, request_types::RequestType, stores::Store,
            subscription_event_types::SubscriptionEventType,
        },
        notifications::{EmailMessage, SubscriptionEmailData},
        pricing::{PricingTable, RequestPrice},
        subscription_events::SubscriptionEvent,
    },
};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub const DEFAULT_HISTORY_LIMIT: i64 = 20;
pub const MAX_HISTORY_LIMIT: i64 = 100;

const EMAIL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum EntitlementError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("unknown product {product_id} for store {store}")]
    UnknownProduct { store: Store, product_id: String },
    #[error("insufficient balance")]
    PaymentRequired,
    #[error("no active credits")]
    NotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl EntitlementError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            EntitlementError::Validation(_) => StatusCode::BAD_REQUEST,
            EntitlementError::PaymentRequired => StatusCode::PAYMENT_REQUIRED,
            EntitlementError::NotFound => StatusCode::NOT_FOUND,
            EntitlementError::UnknownProduct { .. } | EntitlementError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, EntitlementError>;

/// Result of the lazy expiry check.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpiryCheck {
    pub credits: Option<UserCreditsEntity>,
    pub expired: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DebitReceipt {
    pub entry: UsageHistoryEntity,
    pub remaining: f64,
}

/// The only component that mutates balances.
pub struct EntitlementEngine {
    entitlement_repo: Arc<dyn EntitlementRepository + Send + Sync>,
    identity: Arc<dyn IdentityProvider + Send + Sync>,
    notifier: Arc<dyn NotificationSender + Send + Sync>,
    catalog: Arc<StorePackageCatalog>,
    pricing: Arc<PricingTable>,
}

impl EntitlementEngine {
    pub fn new(
        entitlement_repo: Arc<dyn EntitlementRepository + Send + Sync>,
        identity: Arc<dyn IdentityProvider + Send + Sync>,
        notifier: Arc<dyn NotificationSender + Send + Sync>,
        catalog: Arc<StorePackageCatalog>,
        pricing: Arc<PricingTable>,
    ) -> Self {
        Self {
            entitlement_repo,
            identity,
            notifier,
            catalog,
            pricing,
        }
    }

    pub fn price_for(&self, request_type: RequestType) -> RequestPrice {
        self.pricing.price_for(request_type)
    }

    pub async fn apply_event(
        &self,
        event: SubscriptionEvent,
    ) -> UseCaseResult<Option<UserCreditsDto>> {
        let event_type = event.type_;
        let store = event.store();
        info!(
            event_type = %event_type,
            event_id = event.id.as_deref().unwrap_or_default(),
            %store,
            "entitlements: webhook event received"
        );

        if !mutates_or_notifies(event_type) {
            debug!(event_type = %event_type, "entitlements: event ignored");
            return Ok(None);
        }

        let user_id = match event.user_id() {
            Some(user_id) => user_id.to_string(),
            None => {
                let err = EntitlementError::Validation("app_user_id is required".to_string());
                warn!(
                    event_type = %event_type,
                    status = err.status_code().as_u16(),
                    "entitlements: event without app_user_id"
                );
                return Err(err);
            }
        };

        let snapshot = match event_type {
            SubscriptionEventType::InitialPurchase | SubscriptionEventType::Renewal => {
                let product_id = event.product_id.clone().unwrap_or_default();
                let plan = self
                    .catalog
                    .plan_for(store, &product_id)
                    .ok_or_else(|| unknown_product(&user_id, store, &product_id))?;

                let credits = self
                    .entitlement_repo
                    .reset_balances(
                        &user_id,
                        plan.grants.clone(),
                        event.purchased_at(),
                        event.expiration_at(),
                    )
                    .await
                    .map_err(|err| {
                        error!(
                            %user_id,
                            %product_id,
                            db_error = ?err,
                            "entitlements: failed to reset balances"
                        );
                        EntitlementError::Internal(err)
                    })?;

                info!(
                    %user_id,
                    %product_id,
                    plan = %plan.name,
                    "entitlements: plan balances granted"
                );
                Some(credits)
            }
            SubscriptionEventType::NonRenewingPurchase => {
                let product_id = event.product_id.clone().unwrap_or_default();
                let package = self
                    .catalog
                    .package_for(store, &product_id)
                    .ok_or_else(|| unknown_product(&user_id, store, &product_id))?;

                let credits = self
                    .entitlement_repo
                    .add_balances(&user_id, package.grants.clone(), event.purchased_at())
                    .await
                    .map_err(|err| {
                        error!(
                            %user_id,
                            %product_id,
                            db_error = ?err,
                            "entitlements: failed to add package balances"
                        );
                        EntitlementError::Internal(err)
                    })?;

                info!(%user_id, %product_id, "entitlements: package balances added");
                Some(credits)
            }
            SubscriptionEventType::Expiration => {
                let expired_at = event
                    .expiration_at()
                    .or_else(|| event.event_at())
                    .unwrap_or_else(Utc::now);

                let credits = self
                    .entitlement_repo
                    .zero_balances(&user_id, Some(expired_at))
                    .await
                    .map_err(|err| {
                        error!(
                            %user_id,
                            db_error = ?err,
                            "entitlements: failed to zero balances on expiration"
                        );
                        EntitlementError::Internal(err)
                    })?;

                info!(%user_id, "entitlements: subscription expired");
                Some(credits)
            }
            // Balances stay until the store reports the expiration.
            _ => None,
        };

        self.notify(&event, &user_id);

        Ok(snapshot.map(UserCreditsDto::from))
    }

    /// Zeroes an expired record with balance left. Reports `expired` for
    /// already zeroed expired records too.
    pub async fn check_and_expire(&self, user_id: &str) -> UseCaseResult<ExpiryCheck> {
        let credits = self
            .entitlement_repo
            .find_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "entitlements: failed to load credits");
                EntitlementError::Internal(err)
            })?;

        let Some(credits) = credits else {
            return Ok(ExpiryCheck {
                credits: None,
                expired: false,
            });
        };

        if !credits.is_expired_at(Utc::now()) {
            return Ok(ExpiryCheck {
                credits: Some(credits),
                expired: false,
            });
        }

        if credits.balances.is_depleted() {
            return Ok(ExpiryCheck {
                credits: Some(credits),
                expired: true,
            });
        }

        let zeroed = self
            .entitlement_repo
            .zero_balances(user_id, None)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "entitlements: failed to expire credits");
                EntitlementError::Internal(err)
            })?;

        info!(%user_id, "entitlements: expired balances zeroed");
        Ok(ExpiryCheck {
            credits: Some(zeroed),
            expired: true,
        })
    }

    /// Read-only availability check. Never mutates beyond the lazy expiry.
    pub async fn check_and_reserve(
        &self,
        user_id: &str,
        ledger: LedgerKey,
        cost: f64,
    ) -> UseCaseResult<bool> {
        let check = self.check_and_expire(user_id).await?;

        let allowed = match check.credits {
            Some(credits) if !check.expired => credits.balances.covers(ledger, cost),
            _ => false,
        };

        debug!(
            %user_id,
            %ledger,
            cost,
            allowed,
            "entitlements: availability checked"
        );
        Ok(allowed)
    }

    pub async fn debit(&self, request: DebitRequest) -> UseCaseResult<DebitReceipt> {
        if !request.amount.is_finite() || request.amount < 0.0 {
            return Err(EntitlementError::Validation(format!(
                "invalid debit amount: {}",
                request.amount
            )));
        }

        let user_id = request.user_id.clone();
        let ledger = request.ledger;
        let amount = request.amount;
        let request_type = request.request_type;

        let outcome = self.entitlement_repo.debit(request).await.map_err(|err| {
            error!(
                %user_id,
                %ledger,
                amount,
                db_error = ?err,
                "entitlements: debit failed"
            );
            EntitlementError::Internal(err)
        })?;

        match outcome {
            DebitOutcome::Applied { entry, remaining } => {
                info!(
                    %user_id,
                    %ledger,
                    request_type = %request_type,
                    amount,
                    remaining,
                    "entitlements: debit applied"
                );
                Ok(DebitReceipt { entry, remaining })
            }
            DebitOutcome::Insufficient => {
                let err = EntitlementError::PaymentRequired;
                warn!(
                    %user_id,
                    %ledger,
                    amount,
                    status = err.status_code().as_u16(),
                    "entitlements: balance did not cover debit"
                );
                Err(err)
            }
        }
    }

    pub async fn credit_details(&self, user_id: &str) -> UseCaseResult<UserCreditsDto> {
        let check = self.check_and_expire(user_id).await?;

        match check.credits {
            Some(credits) if !check.expired => Ok(UserCreditsDto::from(credits)),
            _ => {
                info!(
                    %user_id,
                    expired = check.expired,
                    "entitlements: no active credits"
                );
                Err(EntitlementError::NotFound)
            }
        }
    }

    pub async fn usage_history(
        &self,
        user_id: &str,
        limit: Option<i64>,
    ) -> UseCaseResult<Vec<UsageHistoryDto>> {
        let limit = limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT);

        let entries = self
            .entitlement_repo
            .list_usage_history(user_id, limit)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "entitlements: failed to list usage history");
                EntitlementError::Internal(err)
            })?;

        Ok(entries.into_iter().map(UsageHistoryDto::from).collect())
    }

    /// Creates the record with `grants` when the user has none. Returns
    /// whether it was created.
    pub async fn grant_if_absent(
        &self,
        user_id: &str,
        grants: CreditBalances,
        expired_at: Option<DateTime<Utc>>,
    ) -> UseCaseResult<bool> {
        let created = self
            .entitlement_repo
            .insert_if_absent(user_id, grants, expired_at)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "entitlements: failed to grant balances");
                EntitlementError::Internal(err)
            })?;

        info!(%user_id, created, "entitlements: grant if absent");
        Ok(created)
    }

    pub async fn delete_user_data(&self, user_id: &str) -> UseCaseResult<()> {
        self.entitlement_repo
            .delete_user_data(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "entitlements: failed to delete user data");
                EntitlementError::Internal(err)
            })
    }

    fn notify(&self, event: &SubscriptionEvent, user_id: &str) -> Option<JoinHandle<()>> {
        if !EmailMessage::supports_event(event.type_) {
            return None;
        }

        let message = EmailMessage::SubscriptionEvent {
            event_type: event.type_,
            details: self.email_details(event),
        };
        let identity = Arc::clone(&self.identity);
        let notifier = Arc::clone(&self.notifier);
        let user_id = user_id.to_string();

        Some(tokio::spawn(async move {
            let recipient = match identity.get_user(&user_id).await {
                Ok(Some(user)) => user.email,
                Ok(None) => None,
                Err(err) => {
                    error!(%user_id, error = ?err, "entitlements: failed to look up email recipient");
                    return;
                }
            };

            let Some(recipient) = recipient else {
                warn!(%user_id, "entitlements: no email address for subscription notice");
                return;
            };

            match notifier.send(&recipient, message).await {
                Ok(()) => info!(%user_id, "entitlements: subscription email sent"),
                Err(err) => {
                    error!(%user_id, error = ?err, "entitlements: failed to send subscription email")
                }
            }
        }))
    }

    fn email_details(&self, event: &SubscriptionEvent) -> SubscriptionEmailData {
        let product_id = event.product_id.clone().unwrap_or_default();
        let subscription_plan = self
            .catalog
            .plan_for(event.store(), &product_id)
            .map(|plan| plan.name.clone())
            .unwrap_or_else(|| product_id.clone());

        SubscriptionEmailData {
            subscription_plan,
            transaction_id: event.transaction_id.clone().unwrap_or_default(),
            purchase_time: format_time(event.purchased_at()),
            expiration_time: format_time(event.expiration_at()),
            price: format!(
                "{:.2} {}",
                event
                    .price_in_purchased_currency
                    .or(event.price)
                    .unwrap_or_default(),
                event.currency.as_deref().unwrap_or("USD")
            ),
        }
    }
}

fn mutates_or_notifies(event_type: SubscriptionEventType) -> bool {
    matches!(
        event_type,
        SubscriptionEventType::InitialPurchase
            | SubscriptionEventType::Renewal
            | SubscriptionEventType::NonRenewingPurchase
            | SubscriptionEventType::Expiration
            | SubscriptionEventType::Cancellation
    )
}

fn unknown_product(user_id: &str, store: Store, product_id: &str) -> EntitlementError {
    let err = EntitlementError::UnknownProduct {
        store,
        product_id: product_id.to_string(),
    };
    error!(
        %user_id,
        %store,
        %product_id,
        status = err.status_code().as_u16(),
        "entitlements: product missing from catalog"
    );
    err
}

fn format_time(at: Option<DateTime<Utc>>) -> String {
    at.map(|at| at.format(EMAIL_TIME_FORMAT).to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use crates::domain::{
        repositories::{
            entitlements::MockEntitlementRepository, identity::MockIdentityProvider,
            notifications::MockNotificationSender,
        },
        value_objects::{
            catalog::PlanDefinition, enums::plan_models::PlanModel, identity::IdentityUser,
            pricing::PriceSettings,
        },
    };
    use mockall::predicate::eq;
    use uuid::Uuid;

    const USER: &str = "firebase-uid-1";

    fn catalog() -> StorePackageCatalog {
        let mut catalog = StorePackageCatalog::new();
        catalog.insert_plan(
            Store::AppStore,
            "lensquery_pro_monthly",
            PlanDefinition {
                name: "Pro Monthly".to_string(),
                grants: CreditBalances::new().with(LedgerKey::Credit, 5.0),
            },
        );
        catalog.insert_package(
            Store::PlayStore,
            "credits_100",
            PlanDefinition {
                name: "100 credits".to_string(),
                grants: CreditBalances::new().with(LedgerKey::Credit, 1.0),
            },
        );
        catalog
    }

    fn credits(balances: CreditBalances, expired_at: Option<DateTime<Utc>>) -> UserCreditsEntity {
        let now = Utc::now();
        UserCreditsEntity {
            user_id: USER.to_string(),
            balances,
            purchased_at: None,
            expired_at,
            created_at: now,
            updated_at: now,
        }
    }

    fn event(type_: SubscriptionEventType, store: Store, product_id: &str) -> SubscriptionEvent {
        SubscriptionEvent {
            type_,
            id: Some("evt_1".to_string()),
            app_user_id: Some(USER.to_string()),
            product_id: Some(product_id.to_string()),
            store: Some(store),
            environment: Some("PRODUCTION".to_string()),
            period_type: None,
            purchased_at_ms: Some(1_700_000_000_000),
            expiration_at_ms: Some(1_702_592_000_000),
            event_timestamp_ms: None,
            transaction_id: Some("txn_1".to_string()),
            price: Some(4.99),
            price_in_purchased_currency: Some(4.99),
            currency: Some("USD".to_string()),
        }
    }

    fn quiet_identity() -> MockIdentityProvider {
        let mut identity = MockIdentityProvider::new();
        identity.expect_get_user().returning(|_| Ok(None));
        identity
    }

    fn engine(
        repo: MockEntitlementRepository,
        identity: MockIdentityProvider,
        notifier: MockNotificationSender,
    ) -> EntitlementEngine {
        EntitlementEngine::new(
            Arc::new(repo),
            Arc::new(identity),
            Arc::new(notifier),
            Arc::new(catalog()),
            Arc::new(PricingTable::new(PlanModel::Credit, &PriceSettings::default())),
        )
    }

    #[tokio::test]
    async fn renewal_resets_balances_to_plan_grant() {
        let mut repo = MockEntitlementRepository::new();
        let grants = CreditBalances::new().with(LedgerKey::Credit, 5.0);
        let expected_expiry = Utc.timestamp_millis_opt(1_702_592_000_000).single();

        repo.expect_reset_balances()
            .withf(move |user_id, balances, _, expired_at| {
                user_id == USER && *balances == grants && *expired_at == expected_expiry
            })
            .times(1)
            .returning(move |_, balances, _, expired_at| Ok(credits(balances, expired_at)));
        repo.expect_add_balances().never();

        let engine = engine(repo, quiet_identity(), MockNotificationSender::new());

        let snapshot = engine
            .apply_event(event(
                SubscriptionEventType::Renewal,
                Store::AppStore,
                "lensquery_pro_monthly",
            ))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(snapshot.balances.get(LedgerKey::Credit), 5.0);
        assert_eq!(snapshot.expired_at, expected_expiry);
    }

    #[tokio::test]
    async fn unknown_product_mutates_nothing() {
        let mut repo = MockEntitlementRepository::new();
        repo.expect_reset_balances().never();
        repo.expect_add_balances().never();

        let engine = engine(repo, MockIdentityProvider::new(), MockNotificationSender::new());

        let err = engine
            .apply_event(event(
                SubscriptionEventType::InitialPurchase,
                Store::PlayStore,
                "lensquery_pro_monthly",
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, EntitlementError::UnknownProduct { .. }));
        assert_eq!(err.status_code().as_u16(), 500);
    }

    #[tokio::test]
    async fn non_renewing_purchase_adds_package() {
        let mut repo = MockEntitlementRepository::new();
        repo.expect_add_balances()
            .withf(|user_id, grants, _| {
                user_id == USER && grants.get(LedgerKey::Credit) == 1.0
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(credits(
                    CreditBalances::new().with(LedgerKey::Credit, 1.5),
                    None,
                ))
            });

        let engine = engine(repo, MockIdentityProvider::new(), MockNotificationSender::new());

        let snapshot = engine
            .apply_event(event(
                SubscriptionEventType::NonRenewingPurchase,
                Store::PlayStore,
                "credits_100",
            ))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(snapshot.balances.get(LedgerKey::Credit), 1.5);
    }

    #[tokio::test]
    async fn top_up_after_expiry_is_spendable() {
        let stored = Arc::new(std::sync::Mutex::new(credits(
            CreditBalances::zeroed(),
            Some(Utc::now() - Duration::days(3)),
        )));

        let mut repo = MockEntitlementRepository::new();
        let find = Arc::clone(&stored);
        repo.expect_find_by_user_id()
            .returning(move |_| Ok(Some(find.lock().unwrap().clone())));
        let add = Arc::clone(&stored);
        repo.expect_add_balances()
            .times(1)
            .returning(move |_, grants, _| {
                let mut record = add.lock().unwrap();
                record.balances.add(&grants);
                if record.is_expired_at(Utc::now()) {
                    record.expired_at = None;
                }
                Ok(record.clone())
            });
        repo.expect_zero_balances().never();

        let engine = engine(repo, MockIdentityProvider::new(), MockNotificationSender::new());

        engine
            .apply_event(event(
                SubscriptionEventType::NonRenewingPurchase,
                Store::PlayStore,
                "credits_100",
            ))
            .await
            .unwrap();

        assert!(engine.check_and_reserve(USER, LedgerKey::Credit, 0.01).await.unwrap());
        let details = engine.credit_details(USER).await.unwrap();
        assert_eq!(details.balances.get(LedgerKey::Credit), 1.0);
    }

    #[tokio::test]
    async fn expiration_for_unknown_user_creates_zeroed_record() {
        let mut repo = MockEntitlementRepository::new();
        let expected_expiry = Utc.timestamp_millis_opt(1_702_592_000_000).single();
        repo.expect_zero_balances()
            .with(eq(USER), eq(expected_expiry))
            .times(1)
            .returning(|_, expired_at| Ok(credits(CreditBalances::zeroed(), expired_at)));

        let engine = engine(repo, quiet_identity(), MockNotificationSender::new());

        let snapshot = engine
            .apply_event(event(
                SubscriptionEventType::Expiration,
                Store::AppStore,
                "anything",
            ))
            .await
            .unwrap()
            .unwrap();

        assert!(snapshot.balances.is_depleted());
        assert_eq!(snapshot.balances.iter().count(), LedgerKey::ALL.len());
    }

    #[tokio::test]
    async fn expiration_without_timestamp_falls_back_to_event_time() {
        let mut repo = MockEntitlementRepository::new();
        let event_at = Utc.timestamp_millis_opt(1_702_000_000_000).single();
        repo.expect_zero_balances()
            .with(eq(USER), eq(event_at))
            .times(1)
            .returning(|_, expired_at| Ok(credits(CreditBalances::zeroed(), expired_at)));

        let engine = engine(repo, quiet_identity(), MockNotificationSender::new());

        let mut expiration = event(SubscriptionEventType::Expiration, Store::AppStore, "anything");
        expiration.expiration_at_ms = None;
        expiration.event_timestamp_ms = Some(1_702_000_000_000);

        let snapshot = engine.apply_event(expiration).await.unwrap().unwrap();
        assert_eq!(snapshot.expired_at, event_at);
    }

    #[tokio::test]
    async fn expiration_without_any_timestamp_expires_now() {
        let mut repo = MockEntitlementRepository::new();
        let before = Utc::now();
        repo.expect_zero_balances()
            .withf(move |user_id, expired_at| {
                user_id == USER && expired_at.is_some_and(|at| at >= before && at <= Utc::now())
            })
            .times(1)
            .returning(|_, expired_at| Ok(credits(CreditBalances::zeroed(), expired_at)));
        repo.expect_find_by_user_id().returning(move |_| {
            Ok(Some(credits(CreditBalances::zeroed(), Some(before))))
        });

        let engine = engine(repo, quiet_identity(), MockNotificationSender::new());

        let mut expiration = event(SubscriptionEventType::Expiration, Store::AppStore, "anything");
        expiration.expiration_at_ms = None;
        expiration.event_timestamp_ms = None;
        engine.apply_event(expiration).await.unwrap();

        let details = engine.credit_details(USER).await.unwrap_err();
        assert_eq!(details.status_code().as_u16(), 404);
    }

    #[tokio::test]
    async fn cancellation_leaves_balances_untouched() {
        let mut repo = MockEntitlementRepository::new();
        repo.expect_reset_balances().never();
        repo.expect_zero_balances().never();
        repo.expect_add_balances().never();

        let engine = engine(repo, quiet_identity(), MockNotificationSender::new());

        let snapshot = engine
            .apply_event(event(
                SubscriptionEventType::Cancellation,
                Store::AppStore,
                "lensquery_pro_monthly",
            ))
            .await
            .unwrap();

        assert!(snapshot.is_none());
    }

    #[tokio::test]
    async fn ignored_events_need_no_user() {
        let engine = engine(
            MockEntitlementRepository::new(),
            MockIdentityProvider::new(),
            MockNotificationSender::new(),
        );
        let mut test_event = event(SubscriptionEventType::Test, Store::AppStore, "x");
        test_event.app_user_id = None;

        assert!(engine.apply_event(test_event).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_user_is_a_validation_error() {
        let engine = engine(
            MockEntitlementRepository::new(),
            MockIdentityProvider::new(),
            MockNotificationSender::new(),
        );
        let mut renewal = event(
            SubscriptionEventType::Renewal,
            Store::AppStore,
            "lensquery_pro_monthly",
        );
        renewal.app_user_id = Some("   ".to_string());

        let err = engine.apply_event(renewal).await.unwrap_err();
        assert_eq!(err.status_code().as_u16(), 400);
    }

    #[tokio::test]
    async fn cancellation_email_goes_to_identity_address() {
        let mut identity = MockIdentityProvider::new();
        identity
            .expect_get_user()
            .with(eq(USER))
            .times(1)
            .returning(|user_id| {
                Ok(Some(IdentityUser {
                    user_id: user_id.to_string(),
                    email: Some("someone@example.com".to_string()),
                    email_verified: true,
                    disabled: false,
                }))
            });

        let mut notifier = MockNotificationSender::new();
        notifier
            .expect_send()
            .withf(|recipient, message| {
                recipient == "someone@example.com"
                    && matches!(
                        message,
                        EmailMessage::SubscriptionEvent { event_type, details }
                            if *event_type == SubscriptionEventType::Cancellation
                                && details.subscription_plan == "Pro Monthly"
                                && details.price == "4.99 USD"
                    )
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let engine = engine(MockEntitlementRepository::new(), identity, notifier);
        let cancellation = event(
            SubscriptionEventType::Cancellation,
            Store::AppStore,
            "lensquery_pro_monthly",
        );

        engine
            .notify(&cancellation, USER)
            .expect("cancellation is notified")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn expired_record_with_balance_is_zeroed() {
        let mut repo = MockEntitlementRepository::new();
        let past = Utc::now() - Duration::days(1);
        repo.expect_find_by_user_id().returning(move |_| {
            Ok(Some(credits(
                CreditBalances::new().with(LedgerKey::Credit, 0.3),
                Some(past),
            )))
        });
        repo.expect_zero_balances()
            .with(eq(USER), eq(None::<DateTime<Utc>>))
            .times(2)
            .returning(move |_, _| Ok(credits(CreditBalances::zeroed(), Some(past))));

        let engine = engine(repo, MockIdentityProvider::new(), MockNotificationSender::new());

        let check = engine.check_and_expire(USER).await.unwrap();
        assert!(check.expired);
        assert!(check.credits.unwrap().balances.is_depleted());

        let err = engine.credit_details(USER).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn reserve_checks_balance_against_cost() {
        let mut repo = MockEntitlementRepository::new();
        repo.expect_find_by_user_id().returning(|_| {
            Ok(Some(credits(
                CreditBalances::new().with(LedgerKey::Credit, 0.05),
                None,
            )))
        });
        repo.expect_zero_balances().never();

        let engine = engine(repo, MockIdentityProvider::new(), MockNotificationSender::new());

        assert!(engine.check_and_reserve(USER, LedgerKey::Credit, 0.01).await.unwrap());
        assert!(engine.check_and_reserve(USER, LedgerKey::Credit, 0.05).await.unwrap());
        assert!(!engine.check_and_reserve(USER, LedgerKey::Credit, 0.06).await.unwrap());
        assert!(!engine.check_and_reserve(USER, LedgerKey::TextSnap, 1.0).await.unwrap());
    }

    #[tokio::test]
    async fn debit_records_history_entry() {
        let mut repo = MockEntitlementRepository::new();
        repo.expect_debit()
            .withf(|request| {
                request.ledger == LedgerKey::Credit
                    && request.amount == 0.01
                    && request.request_type == RequestType::Text
            })
            .times(1)
            .returning(|request| {
                Ok(DebitOutcome::Applied {
                    entry: UsageHistoryEntity {
                        id: Uuid::new_v4(),
                        user_id: request.user_id,
                        ledger: request.ledger.to_string(),
                        amount: request.amount,
                        request_type: request.request_type.to_string(),
                        provider_request_id: None,
                        created_at: Utc::now(),
                    },
                    remaining: 0.04,
                })
            });

        let engine = engine(repo, MockIdentityProvider::new(), MockNotificationSender::new());

        let receipt = engine
            .debit(DebitRequest {
                user_id: USER.to_string(),
                ledger: LedgerKey::Credit,
                amount: 0.01,
                request_type: RequestType::Text,
                provider_request_id: None,
            })
            .await
            .unwrap();

        assert!((receipt.remaining - 0.04).abs() < 1e-12);
        assert_eq!(receipt.entry.request_type, "text");
    }

    #[tokio::test]
    async fn losing_debit_is_payment_required() {
        let mut repo = MockEntitlementRepository::new();
        repo.expect_debit()
            .returning(|_| Ok(DebitOutcome::Insufficient));

        let engine = engine(repo, MockIdentityProvider::new(), MockNotificationSender::new());

        let err = engine
            .debit(DebitRequest {
                user_id: USER.to_string(),
                ledger: LedgerKey::Credit,
                amount: 0.02,
                request_type: RequestType::Equation,
                provider_request_id: None,
            })
            .await
            .unwrap_err();

        assert_eq!(err.status_code().as_u16(), 402);
    }

    #[tokio::test]
    async fn history_limit_is_clamped() {
        let mut repo = MockEntitlementRepository::new();
        repo.expect_list_usage_history()
            .with(eq(USER), eq(MAX_HISTORY_LIMIT))
            .times(1)
            .returning(|_, _| Ok(vec![]));
        repo.expect_list_usage_history()
            .with(eq(USER), eq(DEFAULT_HISTORY_LIMIT))
            .times(1)
            .returning(|_, _| Ok(vec![]));

        let engine = engine(repo, MockIdentityProvider::new(), MockNotificationSender::new());

        assert!(engine.usage_history(USER, Some(5_000)).await.unwrap().is_empty());
        assert!(engine.usage_history(USER, None).await.unwrap().is_empty());
    }
}
