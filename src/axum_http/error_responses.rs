use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use crates::domain::value_objects::enums::rate_limit_scopes::RateLimitScope;
use serde::Serialize;
use thiserror::Error;

use crate::usecases::{
    accounts::AccountError, entitlements::EntitlementError, gateway::GatewayError,
    trials::TrialError, verification_codes::VerificationError,
};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<RateLimitScope>,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Payment required")]
    PaymentRequired,

    #[error("Not found")]
    NotFound,

    #[error("Too many requests")]
    RateLimited(RateLimitScope),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Maps a use-case error by its status. Server-side details stay in the
    /// logs written where the error happened.
    fn from_status(status: StatusCode, message: String) -> Self {
        match status {
            StatusCode::BAD_REQUEST => AppError::BadRequest(message),
            StatusCode::UNAUTHORIZED => AppError::Unauthorized,
            StatusCode::PAYMENT_REQUIRED => AppError::PaymentRequired,
            StatusCode::NOT_FOUND => AppError::NotFound,
            _ => AppError::Internal(anyhow::anyhow!(message)),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, type_) = match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string(), None),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::PaymentRequired => (StatusCode::PAYMENT_REQUIRED, self.to_string(), None),
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string(), None),
            AppError::RateLimited(scope) => {
                (StatusCode::TOO_MANY_REQUESTS, self.to_string(), Some(scope))
            }
            AppError::Internal(_) => {
                // Don't leak internal error detail to client
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            code: status.as_u16(),
            message,
            type_,
        });

        (status, body).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<EntitlementError> for AppError {
    fn from(err: EntitlementError) -> Self {
        AppError::from_status(err.status_code(), err.to_string())
    }
}

impl From<TrialError> for AppError {
    fn from(err: TrialError) -> Self {
        AppError::from_status(err.status_code(), err.to_string())
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        AppError::from_status(err.status_code(), err.to_string())
    }
}

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        AppError::from_status(err.status_code(), err.to_string())
    }
}

impl From<VerificationError> for AppError {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::RateLimited(scope) => AppError::RateLimited(scope),
            other => AppError::from_status(other.status_code(), other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn rate_limited_body_names_the_scope() {
        let response = AppError::from(VerificationError::RateLimited(RateLimitScope::Email))
            .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = body_json(response).await;
        assert_eq!(body["type"], "EMAIL");
        assert_eq!(body["code"], 429);
    }

    #[tokio::test]
    async fn internal_details_are_hidden() {
        let response = AppError::from(GatewayError::Upstream {
            provider: "mathpix",
            source: anyhow::anyhow!("app_key rejected: sk-live-123"),
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Internal server error");
        assert!(body.get("type").is_none());
    }

    #[tokio::test]
    async fn payment_required_maps_to_402() {
        let response = AppError::from(EntitlementError::PaymentRequired).into_response();
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);

        let response = AppError::from(GatewayError::PaymentRequired).into_response();
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    }
}
