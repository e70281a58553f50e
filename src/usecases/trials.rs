use std::sync::Arc;

use chrono::Utc;
use crates::domain::{
    entities::trial_records::TrialRecordEntity,
    repositories::{identity::IdentityProvider, trials::TrialRepository},
    value_objects::{
        enums::trial_statuses::TrialStatus,
        trials::{TrialActivationDto, TrialSettings},
        verification::is_plausible_email,
    },
};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::usecases::entitlements::{EntitlementEngine, EntitlementError};

#[derive(Debug, Error)]
pub enum TrialError {
    #[error("invalid trial request: {0}")]
    Validation(String),
    #[error("identity provider request failed")]
    Upstream(#[source] anyhow::Error),
    #[error(transparent)]
    Entitlement(#[from] EntitlementError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl TrialError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            TrialError::Validation(_) => StatusCode::BAD_REQUEST,
            TrialError::Entitlement(err) => err.status_code(),
            TrialError::Upstream(_) | TrialError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, TrialError>;

pub struct TrialUseCase {
    trial_repo: Arc<dyn TrialRepository + Send + Sync>,
    identity: Arc<dyn IdentityProvider + Send + Sync>,
    entitlements: Arc<EntitlementEngine>,
    settings: TrialSettings,
}

impl TrialUseCase {
    pub fn new(
        trial_repo: Arc<dyn TrialRepository + Send + Sync>,
        identity: Arc<dyn IdentityProvider + Send + Sync>,
        entitlements: Arc<EntitlementEngine>,
        settings: TrialSettings,
    ) -> Self {
        Self {
            trial_repo,
            identity,
            entitlements,
            settings,
        }
    }

    /// Grants the one-off trial. Repeated calls report the first activation.
    pub async fn activate_trial(
        &self,
        user_id: &str,
        claimed_email: &str,
    ) -> UseCaseResult<TrialActivationDto> {
        info!(%user_id, "trials: activation requested");

        if !is_plausible_email(claimed_email) {
            return Err(self.rejected(user_id, "email is invalid"));
        }

        let user = self.identity.get_user(user_id).await.map_err(|err| {
            error!(%user_id, provider = "firebase", error = ?err, "trials: failed to load user");
            TrialError::Upstream(err)
        })?;

        match user {
            Some(user) if user.email_matches(claimed_email) => {}
            Some(_) => return Err(self.rejected(user_id, "email does not match the account")),
            None => return Err(self.rejected(user_id, "user does not exist")),
        }

        if let Some(existing) = self.find_existing(user_id).await? {
            info!(%user_id, "trials: trial already activated");
            return Ok(already_activated(existing));
        }

        let now = Utc::now();
        let record = TrialRecordEntity {
            user_id: user_id.to_string(),
            email: claimed_email.trim().to_string(),
            expired_at: now + self.settings.period,
            created_at: now,
        };
        let expired_at = record.expired_at;

        let inserted = self
            .trial_repo
            .insert_if_absent(record)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "trials: failed to insert trial record");
                TrialError::Internal(err)
            })?;

        if !inserted {
            let existing = self.find_existing(user_id).await?.ok_or_else(|| {
                TrialError::Internal(anyhow::anyhow!("trial record vanished after conflict"))
            })?;
            info!(%user_id, "trials: concurrent activation won by another request");
            return Ok(already_activated(existing));
        }

        let granted = match self
            .entitlements
            .grant_if_absent(user_id, self.settings.grants.clone(), Some(expired_at))
            .await
        {
            Ok(granted) => granted,
            Err(err) => {
                error!(%user_id, error = ?err, "trials: grant failed, removing trial record");
                if let Err(delete_err) = self.trial_repo.delete(user_id).await {
                    error!(
                        %user_id,
                        db_error = ?delete_err,
                        "trials: failed to remove trial record after grant failure"
                    );
                }
                return Err(TrialError::Entitlement(err));
            }
        };

        if !granted {
            warn!(%user_id, "trials: user already had credits, trial grant skipped");
        }

        info!(%user_id, %expired_at, "trials: trial activated");
        Ok(TrialActivationDto {
            status: TrialStatus::Activated,
            expired_at,
        })
    }

    pub async fn delete(&self, user_id: &str) -> UseCaseResult<()> {
        self.trial_repo.delete(user_id).await.map_err(|err| {
            error!(%user_id, db_error = ?err, "trials: failed to delete trial record");
            TrialError::Internal(err)
        })
    }

    async fn find_existing(&self, user_id: &str) -> UseCaseResult<Option<TrialRecordEntity>> {
        self.trial_repo
            .find_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "trials: failed to load trial record");
                TrialError::Internal(err)
            })
    }

    fn rejected(&self, user_id: &str, reason: &str) -> TrialError {
        let err = TrialError::Validation(reason.to_string());
        warn!(
            %user_id,
            reason,
            status = err.status_code().as_u16(),
            "trials: activation rejected"
        );
        err
    }
}

fn already_activated(record: TrialRecordEntity) -> TrialActivationDto {
    TrialActivationDto {
        status: TrialStatus::AlreadyActivated,
        expired_at: record.expired_at,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use chrono::{DateTime, Duration};
    use crates::domain::{
        repositories::{
            entitlements::MockEntitlementRepository, identity::MockIdentityProvider,
            notifications::MockNotificationSender, trials::MockTrialRepository,
        },
        value_objects::{
            catalog::StorePackageCatalog,
            credits::CreditBalances,
            enums::{ledger_keys::LedgerKey, plan_models::PlanModel},
            identity::IdentityUser,
            pricing::{PriceSettings, PricingTable},
        },
    };
    use mockall::predicate::eq;

    const USER: &str = "firebase-uid-7";
    const EMAIL: &str = "trial@example.com";

    fn settings() -> TrialSettings {
        TrialSettings {
            period: Duration::days(7),
            grants: CreditBalances::new()
                .with(LedgerKey::TextSnap, 30.0)
                .with(LedgerKey::EquationSnap, 20.0),
        }
    }

    fn identity_with_email(email: &'static str) -> MockIdentityProvider {
        let mut identity = MockIdentityProvider::new();
        identity.expect_get_user().returning(move |user_id| {
            Ok(Some(IdentityUser {
                user_id: user_id.to_string(),
                email: Some(email.to_string()),
                email_verified: true,
                disabled: false,
            }))
        });
        identity
    }

    fn engine(repo: MockEntitlementRepository) -> Arc<EntitlementEngine> {
        Arc::new(EntitlementEngine::new(
            Arc::new(repo),
            Arc::new(MockIdentityProvider::new()),
            Arc::new(MockNotificationSender::new()),
            Arc::new(StorePackageCatalog::new()),
            Arc::new(PricingTable::new(PlanModel::Snaps, &PriceSettings::default())),
        ))
    }

    /// Trial table kept in memory so repeated activations see earlier inserts.
    fn stateful_trial_repo(store: Arc<Mutex<Option<TrialRecordEntity>>>) -> MockTrialRepository {
        let mut repo = MockTrialRepository::new();
        let reader = Arc::clone(&store);
        repo.expect_find_by_user_id()
            .returning(move |_| Ok(reader.lock().unwrap().clone()));
        let writer = Arc::clone(&store);
        repo.expect_insert_if_absent().returning(move |record| {
            let mut slot = writer.lock().unwrap();
            if slot.is_some() {
                return Ok(false);
            }
            *slot = Some(record);
            Ok(true)
        });
        repo
    }

    #[tokio::test]
    async fn second_activation_returns_first_expiration() {
        let store = Arc::new(Mutex::new(None));
        let mut entitlement_repo = MockEntitlementRepository::new();
        entitlement_repo
            .expect_insert_if_absent()
            .withf(|user_id, grants, expired_at| {
                user_id == USER
                    && grants.get(LedgerKey::TextSnap) == 30.0
                    && grants.get(LedgerKey::EquationSnap) == 20.0
                    && expired_at.is_some()
            })
            .times(1)
            .returning(|_, _, _| Ok(true));

        let usecase = TrialUseCase::new(
            Arc::new(stateful_trial_repo(Arc::clone(&store))),
            Arc::new(identity_with_email(EMAIL)),
            engine(entitlement_repo),
            settings(),
        );

        let first = usecase.activate_trial(USER, EMAIL).await.unwrap();
        let second = usecase
            .activate_trial(USER, "  TRIAL@example.com ")
            .await
            .unwrap();

        assert_eq!(first.status, TrialStatus::Activated);
        assert_eq!(second.status, TrialStatus::AlreadyActivated);
        assert_eq!(first.expired_at, second.expired_at);
        assert!(first.expired_at > Utc::now() + Duration::days(6));
    }

    #[tokio::test]
    async fn mismatched_email_is_rejected_before_any_write() {
        let mut trial_repo = MockTrialRepository::new();
        trial_repo.expect_insert_if_absent().never();

        let usecase = TrialUseCase::new(
            Arc::new(trial_repo),
            Arc::new(identity_with_email("owner@example.com")),
            engine(MockEntitlementRepository::new()),
            settings(),
        );

        let err = usecase.activate_trial(USER, EMAIL).await.unwrap_err();
        assert_eq!(err.status_code().as_u16(), 400);
    }

    #[tokio::test]
    async fn failed_grant_removes_trial_record() {
        let store: Arc<Mutex<Option<TrialRecordEntity>>> = Arc::new(Mutex::new(None));
        let mut trial_repo = stateful_trial_repo(Arc::clone(&store));
        let deleter = Arc::clone(&store);
        trial_repo
            .expect_delete()
            .with(eq(USER))
            .times(1)
            .returning(move |_| {
                *deleter.lock().unwrap() = None;
                Ok(())
            });

        let mut entitlement_repo = MockEntitlementRepository::new();
        entitlement_repo
            .expect_insert_if_absent()
            .returning(|_, _, _| Err(anyhow::anyhow!("connection reset")));

        let usecase = TrialUseCase::new(
            Arc::new(trial_repo),
            Arc::new(identity_with_email(EMAIL)),
            engine(entitlement_repo),
            settings(),
        );

        let err = usecase.activate_trial(USER, EMAIL).await.unwrap_err();

        assert_eq!(err.status_code().as_u16(), 500);
        assert!(store.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn lost_insert_race_reports_winner() {
        let winner_expiry: DateTime<Utc> = Utc::now() + Duration::days(3);
        let mut trial_repo = MockTrialRepository::new();
        let mut lookups = 0;
        trial_repo.expect_find_by_user_id().returning(move |user_id| {
            lookups += 1;
            if lookups == 1 {
                return Ok(None);
            }
            Ok(Some(TrialRecordEntity {
                user_id: user_id.to_string(),
                email: EMAIL.to_string(),
                expired_at: winner_expiry,
                created_at: Utc::now(),
            }))
        });
        trial_repo
            .expect_insert_if_absent()
            .returning(|_| Ok(false));

        let mut entitlement_repo = MockEntitlementRepository::new();
        entitlement_repo.expect_insert_if_absent().never();

        let usecase = TrialUseCase::new(
            Arc::new(trial_repo),
            Arc::new(identity_with_email(EMAIL)),
            engine(entitlement_repo),
            settings(),
        );

        let activation = usecase.activate_trial(USER, EMAIL).await.unwrap();

        assert_eq!(activation.status, TrialStatus::AlreadyActivated);
        assert_eq!(activation.expired_at, winner_expiry);
    }
}
