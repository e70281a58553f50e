use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
    routing::post,
};
use crates::domain::value_objects::trials::ActivateTrialModel;

use crate::{auth::AuthUser, axum_http::error_responses::AppError, usecases::trials::TrialUseCase};

pub fn routes(trials: Arc<TrialUseCase>) -> Router {
    Router::new()
        .route("/activate", post(activate))
        .with_state(trials)
}

pub async fn activate(
    State(trials): State<Arc<TrialUseCase>>,
    auth: AuthUser,
    body: Result<Json<ActivateTrialModel>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(model) = body?;
    let activation = trials.activate_trial(&auth.user_id, &model.email).await?;
    Ok(Json(activation))
}
