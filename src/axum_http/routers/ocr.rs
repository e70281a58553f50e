use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Multipart, State, multipart::MultipartRejection},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use crates::domain::value_objects::ocr::{NoTextFound, OcrImage};
use tracing::{debug, warn};

use crate::{
    auth::AuthUser, axum_http::error_responses::AppError, usecases::gateway::RequestGateway,
};

const IMAGE_FIELD: &str = "image";

pub fn routes(gateway: Arc<RequestGateway>) -> Router {
    Router::new()
        .route("/text", post(detect_text))
        .route("/document", post(detect_document_text))
        .route("/labels", post(detect_labels))
        .route("/equation", post(recognize_equation))
        .route("/token", get(equation_token))
        .with_state(gateway)
}

pub async fn detect_text(
    State(gateway): State<Arc<RequestGateway>>,
    auth: AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let image = read_image(multipart).await?;
    let texts = gateway.detect_text(&auth.user_id, image).await?;

    if texts.is_empty() {
        return Ok(no_text_found());
    }
    Ok(Json(texts).into_response())
}

pub async fn detect_document_text(
    State(gateway): State<Arc<RequestGateway>>,
    auth: AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let image = read_image(multipart).await?;

    match gateway.detect_document_text(&auth.user_id, image).await? {
        Some(document) if !document.data.trim().is_empty() => Ok(Json(document).into_response()),
        _ => Ok(no_text_found()),
    }
}

pub async fn detect_labels(
    State(gateway): State<Arc<RequestGateway>>,
    auth: AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let image = read_image(multipart).await?;
    let labels = gateway.detect_labels(&auth.user_id, image).await?;
    Ok(Json(labels).into_response())
}

pub async fn recognize_equation(
    State(gateway): State<Arc<RequestGateway>>,
    auth: AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let image = read_image(multipart).await?;
    let equation = gateway.recognize_equation(&auth.user_id, image).await?;

    let has_text = equation
        .text
        .as_deref()
        .is_some_and(|text| !text.trim().is_empty());
    if !has_text {
        return Ok(no_text_found());
    }
    Ok(Json(equation).into_response())
}

pub async fn equation_token(
    State(gateway): State<Arc<RequestGateway>>,
    auth: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let token = gateway.issue_equation_token(&auth.user_id).await?;
    Ok(Json(token))
}

fn no_text_found() -> Response {
    Json(NoTextFound::default()).into_response()
}

/// Pulls the `image` part out of the upload. The declared content type wins;
/// otherwise it is guessed from the file name.
async fn read_image(multipart: Result<Multipart, MultipartRejection>) -> Result<OcrImage, AppError> {
    let mut multipart = multipart.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    while let Some(field) = multipart.next_field().await.map_err(|err| {
        warn!(error = %err, "ocr: failed to read multipart field");
        AppError::BadRequest(err.body_text())
    })? {
        if field.name() != Some(IMAGE_FIELD) {
            debug!(field = field.name().unwrap_or_default(), "ocr: skipping multipart field");
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field
            .content_type()
            .map(str::to_string)
            .or_else(|| {
                file_name.as_deref().and_then(|name| {
                    mime_guess::from_path(name)
                        .first()
                        .map(|mime| mime.essence_str().to_string())
                })
            })
            .unwrap_or_else(|| "application/octet-stream".to_string());

        if !content_type.starts_with("image/") {
            return Err(AppError::BadRequest(format!(
                "unsupported content type: {content_type}"
            )));
        }

        let bytes = field.bytes().await.map_err(|err| {
            warn!(error = %err, "ocr: failed to read image bytes");
            AppError::BadRequest(err.body_text())
        })?;
        if bytes.is_empty() {
            return Err(AppError::BadRequest("image is empty".to_string()));
        }

        return Ok(OcrImage {
            bytes,
            content_type,
            file_name,
        });
    }

    Err(AppError::BadRequest(format!("missing `{IMAGE_FIELD}` field")))
}
