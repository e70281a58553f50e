use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;

use crate::{
    auth::AuthUser, axum_http::error_responses::AppError, usecases::entitlements::EntitlementEngine,
};

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

pub fn routes(entitlements: Arc<EntitlementEngine>) -> Router {
    Router::new()
        .route("/details", get(credit_details))
        .route("/history", get(usage_history))
        .with_state(entitlements)
}

pub async fn credit_details(
    State(entitlements): State<Arc<EntitlementEngine>>,
    auth: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let credits = entitlements.credit_details(&auth.user_id).await?;
    Ok(Json(credits))
}

pub async fn usage_history(
    State(entitlements): State<Arc<EntitlementEngine>>,
    auth: AuthUser,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(query) = query?;
    let history = entitlements
        .usage_history(&auth.user_id, query.limit)
        .await?;
    Ok(Json(history))
}
