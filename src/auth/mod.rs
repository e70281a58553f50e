use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use crates::domain::{
    repositories::identity::IdentityProvider, value_objects::identity::IdentityClaims,
};
use tracing::{error, warn};

use crate::axum_http::error_responses::AppError;

/// Identity provider handle the extractor reads from request extensions.
pub type SharedIdentity = Arc<dyn IdentityProvider + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub user_id: String,
    pub email: Option<String>,
    pub email_verified: bool,
}

impl From<IdentityClaims> for AuthUser {
    fn from(claims: IdentityClaims) -> Self {
        Self {
            user_id: claims.user_id,
            email: claims.email,
            email_verified: claims.email_verified,
        }
    }
}

/// Token part of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }
    Some(token)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = parts
            .extensions
            .get::<SharedIdentity>()
            .cloned()
            .ok_or_else(|| {
                error!("auth: identity provider extension is missing");
                AppError::Internal(anyhow::anyhow!("identity provider not configured"))
            })?;

        let token = bearer_token(&parts.headers).ok_or(AppError::Unauthorized)?;

        let claims = identity.verify_token(token).await.map_err(|err| {
            warn!(error = %err, "auth: token rejected");
            AppError::Unauthorized
        })?;

        Ok(AuthUser::from(claims))
    }
}
