use std::sync::Arc;

use crates::domain::repositories::identity::IdentityProvider;
use thiserror::Error;
use tracing::{error, info};

use crate::usecases::{
    entitlements::{EntitlementEngine, EntitlementError},
    trials::{TrialError, TrialUseCase},
};

#[derive(Debug, Error)]
pub enum AccountError {
    #[error(transparent)]
    Entitlement(#[from] EntitlementError),
    #[error(transparent)]
    Trial(#[from] TrialError),
    #[error("identity provider request failed")]
    Upstream(#[source] anyhow::Error),
}

impl AccountError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        match self {
            AccountError::Entitlement(err) => err.status_code(),
            AccountError::Trial(err) => err.status_code(),
            AccountError::Upstream(_) => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, AccountError>;

pub struct AccountUseCase {
    entitlements: Arc<EntitlementEngine>,
    trials: Arc<TrialUseCase>,
    identity: Arc<dyn IdentityProvider + Send + Sync>,
}

impl AccountUseCase {
    pub fn new(
        entitlements: Arc<EntitlementEngine>,
        trials: Arc<TrialUseCase>,
        identity: Arc<dyn IdentityProvider + Send + Sync>,
    ) -> Self {
        Self {
            entitlements,
            trials,
            identity,
        }
    }

    /// Local rows go first so a failed provider call can simply be retried.
    pub async fn delete_account(&self, user_id: &str) -> UseCaseResult<()> {
        info!(%user_id, "accounts: deletion requested");

        self.entitlements.delete_user_data(user_id).await?;
        self.trials.delete(user_id).await?;

        self.identity.delete_user(user_id).await.map_err(|err| {
            error!(%user_id, provider = "firebase", error = ?err, "accounts: failed to delete identity user");
            AccountError::Upstream(err)
        })?;

        info!(%user_id, "accounts: account deleted");
        Ok(())
    }
}
