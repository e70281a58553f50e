use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use crates::domain::value_objects::chat::ChatCompletionRequest;
use futures::{Stream, StreamExt};

use crate::{
    auth::AuthUser,
    axum_http::error_responses::AppError,
    usecases::gateway::{RelayFrame, RequestGateway},
};

const DONE_MARKER: &str = "[DONE]";
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

pub fn routes(gateway: Arc<RequestGateway>) -> Router {
    Router::new()
        .route("/models", get(list_models))
        .route("/completions", post(completions))
        .with_state(gateway)
}

pub async fn list_models(
    State(gateway): State<Arc<RequestGateway>>,
    _auth: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let models = gateway.list_models().await?;
    Ok(Json(models))
}

pub async fn completions(
    State(gateway): State<Arc<RequestGateway>>,
    auth: AuthUser,
    body: Result<Json<ChatCompletionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = body?;
    let frames = gateway.stream_chat(&auth.user_id, request).await?;

    Ok(Sse::new(sse_events(frames))
        .keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL)))
}

fn sse_events(
    frames: impl Stream<Item = RelayFrame> + Send,
) -> impl Stream<Item = Result<Event, Infallible>> + Send {
    frames.map(|frame| {
        let event = match frame {
            RelayFrame::Delta(data) => Event::default().data(data),
            RelayFrame::Done => Event::default().data(DONE_MARKER),
            RelayFrame::Failed => Event::default()
                .event("error")
                .data(r#"{"message":"upstream stream failed"}"#),
        };
        Ok(event)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_render_as_sse() {
        let frames = futures::stream::iter(vec![
            RelayFrame::Delta(r#"{"choices":[{"delta":{"content":"Hi"}}]}"#.to_string()),
            RelayFrame::Done,
        ]);

        let response = Sse::new(sse_events(frames)).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(bytes.to_vec()).unwrap();

        assert_eq!(
            body,
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\ndata: [DONE]\n\n"
        );
    }

    #[tokio::test]
    async fn failure_is_a_named_event() {
        let frames = futures::stream::iter(vec![RelayFrame::Failed]);

        let response = Sse::new(sse_events(frames)).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(bytes.to_vec()).unwrap();

        assert!(body.starts_with("event: error\n"));
    }
}
