use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
    routing::post,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use crates::domain::value_objects::subscription_events::SubscriptionWebhookPayload;
use tracing::warn;

use crate::{axum_http::error_responses::AppError, usecases::entitlements::EntitlementEngine};

#[derive(Clone)]
pub struct WebhookState {
    entitlements: Arc<EntitlementEngine>,
    bearer: Arc<str>,
}

pub fn routes(entitlements: Arc<EntitlementEngine>, bearer: String) -> Router {
    Router::new()
        .route("/event_hook", post(event_hook))
        .with_state(WebhookState {
            entitlements,
            bearer: Arc::from(bearer),
        })
}

pub async fn event_hook(
    State(state): State<WebhookState>,
    authorization: Option<TypedHeader<Authorization<Bearer>>>,
    payload: Result<Json<SubscriptionWebhookPayload>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let authorized = authorization
        .is_some_and(|TypedHeader(header)| header.token() == state.bearer.as_ref());
    if !authorized {
        warn!("subscriptions: webhook rejected, bad bearer");
        return Err(AppError::Unauthorized);
    }

    let Json(payload) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "subscriptions: malformed webhook payload");
        AppError::from(rejection)
    })?;

    let snapshot = state.entitlements.apply_event(payload.event).await?;
    Ok(Json(snapshot))
}
