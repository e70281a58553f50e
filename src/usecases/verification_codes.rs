use std::sync::Arc;

use chrono::{Duration, Utc};
use crates::domain::{
    entities::verification_codes::VerificationCodeEntity,
    repositories::{
        identity::IdentityProvider, notifications::NotificationSender,
        rate_limits::RateLimitRepository, verification_codes::VerificationCodeRepository,
    },
    value_objects::{
        enums::{rate_limit_scopes::RateLimitScope, verification_purposes::VerificationPurpose},
        notifications::EmailMessage,
        rate_limits::RateLimitPolicy,
        verification::{
            IssuedCodeDto, MIN_PASSWORD_LENGTH, is_plausible_email, is_well_formed_code,
        },
    },
};
use rand::{Rng, rngs::OsRng};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("verification code is invalid or expired")]
    Unauthorized,
    #[error("too many requests for {0}")]
    RateLimited(RateLimitScope),
    #[error("{provider} request failed")]
    Upstream {
        provider: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl VerificationError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            VerificationError::Validation(_) => StatusCode::BAD_REQUEST,
            VerificationError::Unauthorized => StatusCode::UNAUTHORIZED,
            VerificationError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            VerificationError::Upstream { .. } | VerificationError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, VerificationError>;

pub type CodeGenerator = Arc<dyn Fn() -> String + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub struct VerificationSettings {
    pub code_ttl: Duration,
    pub email_limit: RateLimitPolicy,
    pub ip_limit: RateLimitPolicy,
}

pub struct VerificationCodeUseCase {
    code_repo: Arc<dyn VerificationCodeRepository + Send + Sync>,
    rate_limits: Arc<dyn RateLimitRepository + Send + Sync>,
    identity: Arc<dyn IdentityProvider + Send + Sync>,
    notifier: Arc<dyn NotificationSender + Send + Sync>,
    settings: VerificationSettings,
    generate_code: CodeGenerator,
}

impl VerificationCodeUseCase {
    pub fn new(
        code_repo: Arc<dyn VerificationCodeRepository + Send + Sync>,
        rate_limits: Arc<dyn RateLimitRepository + Send + Sync>,
        identity: Arc<dyn IdentityProvider + Send + Sync>,
        notifier: Arc<dyn NotificationSender + Send + Sync>,
        settings: VerificationSettings,
    ) -> Self {
        Self {
            code_repo,
            rate_limits,
            identity,
            notifier,
            settings,
            generate_code: Arc::new(generate_code),
        }
    }

    pub fn with_code_generator(mut self, generate_code: CodeGenerator) -> Self {
        self.generate_code = generate_code;
        self
    }

    /// Rate limits, stores a fresh code over any live one and emails it.
    pub async fn issue(
        &self,
        purpose: VerificationPurpose,
        recipient: &str,
        client_address: Option<&str>,
    ) -> UseCaseResult<IssuedCodeDto> {
        let identifier = normalize_identifier(recipient)?;
        info!(%purpose, "verification: code requested");

        self.acquire(RateLimitScope::Email, &identifier, self.settings.email_limit)
            .await?;
        if let Some(address) = client_address {
            self.acquire(RateLimitScope::Ip, address, self.settings.ip_limit)
                .await?;
        }

        let now = Utc::now();
        let expires_at = now + self.settings.code_ttl;
        let code = (self.generate_code)();

        self.code_repo
            .upsert(VerificationCodeEntity {
                purpose: purpose.to_string(),
                identifier: identifier.clone(),
                code: code.clone(),
                created_at: now,
                expires_at,
            })
            .await
            .map_err(|err| {
                error!(%purpose, db_error = ?err, "verification: failed to store code");
                VerificationError::Internal(err)
            })?;

        self.notifier
            .send(
                &identifier,
                EmailMessage::VerificationCode {
                    purpose,
                    code,
                    expires_at,
                },
            )
            .await
            .map_err(|err| {
                error!(
                    %purpose,
                    provider = "smtp",
                    error = ?err,
                    "verification: failed to send code email"
                );
                VerificationError::Upstream {
                    provider: "smtp",
                    source: err,
                }
            })?;

        info!(%purpose, %expires_at, "verification: code issued");
        Ok(IssuedCodeDto { exp: expires_at })
    }

    /// Issues a `VERIFY_EMAIL` code to the account's own address.
    pub async fn request_verify_email(
        &self,
        user_id: &str,
        client_address: Option<&str>,
    ) -> UseCaseResult<IssuedCodeDto> {
        let user = self.identity.get_user(user_id).await.map_err(|err| {
            error!(%user_id, provider = "firebase", error = ?err, "verification: failed to load user");
            VerificationError::Upstream {
                provider: "firebase",
                source: err,
            }
        })?;

        let email = user
            .and_then(|user| user.email)
            .ok_or_else(|| VerificationError::Validation("account has no email".to_string()))?;

        self.issue(VerificationPurpose::VerifyEmail, &email, client_address)
            .await
    }

    /// Single use: a successful verification deletes the code.
    pub async fn verify(
        &self,
        purpose: VerificationPurpose,
        recipient: &str,
        code: &str,
    ) -> UseCaseResult<()> {
        let identifier = normalize_identifier(recipient)?;
        let code = code.trim();
        if !is_well_formed_code(code) {
            return Err(VerificationError::Unauthorized);
        }

        let consumed = self
            .code_repo
            .consume(purpose, &identifier, code, Utc::now())
            .await
            .map_err(|err| {
                error!(%purpose, db_error = ?err, "verification: failed to consume code");
                VerificationError::Internal(err)
            })?;

        if !consumed {
            warn!(%purpose, "verification: code rejected");
            return Err(VerificationError::Unauthorized);
        }

        info!(%purpose, "verification: code verified");
        Ok(())
    }

    /// Sets a new password for the owner of a live reset code. The code is
    /// only spent once the identity provider accepted the password.
    pub async fn update_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> UseCaseResult<()> {
        let purpose = VerificationPurpose::ResetPassword;
        let identifier = normalize_identifier(email)?;
        let code = code.trim();

        if new_password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(VerificationError::Validation(format!(
                "new_password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }
        if !is_well_formed_code(code) {
            return Err(VerificationError::Unauthorized);
        }

        let now = Utc::now();
        let live = self
            .code_repo
            .find_live(purpose, &identifier, now)
            .await
            .map_err(|err| {
                error!(%purpose, db_error = ?err, "verification: failed to load code");
                VerificationError::Internal(err)
            })?;

        match live {
            Some(entry) if entry.code == code => {}
            _ => {
                warn!(%purpose, "verification: reset code rejected");
                return Err(VerificationError::Unauthorized);
            }
        }

        let user = self
            .identity
            .get_user_by_email(&identifier)
            .await
            .map_err(|err| {
                error!(provider = "firebase", error = ?err, "verification: failed to look up user by email");
                VerificationError::Upstream {
                    provider: "firebase",
                    source: err,
                }
            })?
            .ok_or_else(|| VerificationError::Upstream {
                provider: "firebase",
                source: anyhow::anyhow!("no account for the reset address"),
            })?;

        self.identity
            .update_password(&user.user_id, new_password)
            .await
            .map_err(|err| {
                error!(
                    user_id = %user.user_id,
                    provider = "firebase",
                    error = ?err,
                    "verification: failed to update password"
                );
                VerificationError::Upstream {
                    provider: "firebase",
                    source: err,
                }
            })?;

        let consumed = self
            .code_repo
            .consume(purpose, &identifier, code, Utc::now())
            .await
            .map_err(|err| {
                error!(%purpose, db_error = ?err, "verification: failed to consume reset code");
                VerificationError::Internal(err)
            })?;
        if !consumed {
            warn!(user_id = %user.user_id, "verification: reset code expired during update");
        }

        info!(user_id = %user.user_id, "verification: password updated");
        Ok(())
    }

    pub async fn purge_expired(&self) -> UseCaseResult<usize> {
        let purged = self
            .code_repo
            .purge_expired(Utc::now())
            .await
            .map_err(VerificationError::Internal)?;
        if purged > 0 {
            info!(purged, "verification: expired codes purged");
        }
        Ok(purged)
    }

    /// Drops rate-limit attempts older than the longest configured window.
    pub async fn purge_stale_rate_limits(&self) -> UseCaseResult<usize> {
        let longest = self.settings.email_limit.period.max(self.settings.ip_limit.period);
        let purged = self
            .rate_limits
            .purge_before(Utc::now() - longest)
            .await
            .map_err(VerificationError::Internal)?;
        if purged > 0 {
            info!(purged, "verification: stale rate limit attempts purged");
        }
        Ok(purged)
    }

    async fn acquire(
        &self,
        scope: RateLimitScope,
        subject: &str,
        policy: RateLimitPolicy,
    ) -> UseCaseResult<()> {
        let allowed = self
            .rate_limits
            .try_acquire(scope, subject, policy, Utc::now())
            .await
            .map_err(|err| {
                error!(%scope, db_error = ?err, "verification: rate limiter failed");
                VerificationError::Internal(err)
            })?;

        if allowed {
            return Ok(());
        }

        let err = VerificationError::RateLimited(scope);
        warn!(
            %scope,
            status = err.status_code().as_u16(),
            "verification: rate limit exceeded"
        );
        Err(err)
    }
}

fn normalize_identifier(recipient: &str) -> UseCaseResult<String> {
    if !is_plausible_email(recipient) {
        return Err(VerificationError::Validation(
            "a valid email address is required".to_string(),
        ));
    }
    Ok(recipient.trim().to_ascii_lowercase())
}

/// Six uniformly distributed digits from the OS generator.
fn generate_code() -> String {
    format!("{:06}", OsRng.gen_range(0..1_000_000u32))
}
