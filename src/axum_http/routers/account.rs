use std::{net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::{
        ConnectInfo, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
};
use crates::domain::value_objects::{
    enums::verification_purposes::VerificationPurpose,
    verification::{RequestCodeQuery, UpdatePasswordModel, VerifyCodeQuery},
};

use crate::{
    auth::AuthUser,
    axum_http::error_responses::AppError,
    usecases::{accounts::AccountUseCase, verification_codes::VerificationCodeUseCase},
};

#[derive(Clone)]
pub struct AccountState {
    verification: Arc<VerificationCodeUseCase>,
    accounts: Arc<AccountUseCase>,
}

pub fn routes(verification: Arc<VerificationCodeUseCase>, accounts: Arc<AccountUseCase>) -> Router {
    Router::new()
        .route("/", delete(delete_account))
        .route("/reset_password", post(reset_password))
        .route("/verify_code", get(verify_code).post(verify_code))
        .route("/update_password", post(update_password))
        .route("/request_verify_email", post(request_verify_email))
        .with_state(AccountState {
            verification,
            accounts,
        })
}

pub async fn reset_password(
    State(state): State<AccountState>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    query: Result<Query<RequestCodeQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query?;
    let client_address = client_address(&headers, connect_info);

    let issued = state
        .verification
        .issue(
            VerificationPurpose::ResetPassword,
            &query.recipient,
            client_address.as_deref(),
        )
        .await?;

    Ok((StatusCode::ACCEPTED, Json(issued)))
}

pub async fn verify_code(
    State(state): State<AccountState>,
    query: Result<Query<VerifyCodeQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query?;
    let purpose = query
        .purpose()
        .ok_or_else(|| AppError::BadRequest(format!("unknown code type: {}", query.purpose)))?;

    state
        .verification
        .verify(purpose, &query.email, &query.code)
        .await?;

    Ok(StatusCode::OK)
}

pub async fn update_password(
    State(state): State<AccountState>,
    body: Result<Json<UpdatePasswordModel>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(model) = body?;

    state
        .verification
        .update_password(&model.email, &model.code, &model.new_password)
        .await?;

    Ok(StatusCode::OK)
}

pub async fn request_verify_email(
    State(state): State<AccountState>,
    auth: AuthUser,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> Result<impl IntoResponse, AppError> {
    let client_address = client_address(&headers, connect_info);

    let issued = state
        .verification
        .request_verify_email(&auth.user_id, client_address.as_deref())
        .await?;

    Ok((StatusCode::ACCEPTED, Json(issued)))
}

pub async fn delete_account(
    State(state): State<AccountState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    state.accounts.delete_account(&auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// First hop of `X-Forwarded-For`, else the socket peer.
fn client_address(
    headers: &HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| connect_info.map(|ConnectInfo(addr)| addr.ip().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_address_prefers_forwarded_header() {
        let peer = Some(ConnectInfo(SocketAddr::from(([10, 0, 0, 7], 41000))));

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        assert_eq!(
            client_address(&headers, peer).as_deref(),
            Some("203.0.113.9")
        );

        let headers = HeaderMap::new();
        assert_eq!(client_address(&headers, peer).as_deref(), Some("10.0.0.7"));
        assert_eq!(client_address(&headers, None), None);
    }
}
