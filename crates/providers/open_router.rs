use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use futures::{StreamExt, stream};
use reqwest::{
    StatusCode,
    header::{HeaderMap, HeaderValue},
};
use reqwest_eventsource::{Event, EventSource, RequestBuilderExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::ensure_success;
use crate::domain::{
    repositories::llm_gateway::LlmGateway,
    value_objects::chat::{ChatChunk, ChatCompletionRequest, ChatStream, ModelSummary},
};

const PROVIDER: &str = "open_router";
pub const DEFAULT_OPEN_ROUTER_URL: &str = "https://openrouter.ai/api/v1";
const DONE_MARKER: &str = "[DONE]";

#[derive(Debug, Clone)]
pub struct OpenRouterSettings {
    pub api_key: String,
    pub base_url: Option<String>,
    pub referer: String,
    pub title: String,
}

#[derive(Debug, Serialize)]
struct StreamingRequest<'a> {
    #[serde(flatten)]
    request: &'a ChatCompletionRequest,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelSummary>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    data: GenerationStats,
}

#[derive(Debug, Deserialize)]
struct GenerationStats {
    #[serde(default)]
    total_cost: Option<f64>,
}

/// Decodes one `data:` payload. `Ok(None)` marks the end of the stream.
fn parse_stream_data(data: &str) -> Result<Option<ChatChunk>> {
    let data = data.trim();
    if data == DONE_MARKER {
        return Ok(None);
    }

    let chunk: StreamChunk =
        serde_json::from_str(data).with_context(|| "malformed completion chunk")?;
    if let Some(error) = chunk.error {
        return Err(anyhow!("completion stream error: {}", error.message));
    }

    let content = chunk
        .choices
        .into_iter()
        .filter_map(|choice| choice.delta.and_then(|delta| delta.content))
        .collect::<String>();

    Ok(Some(ChatChunk {
        generation_id: chunk.id,
        content,
    }))
}

enum StreamState {
    Open(EventSource),
    Finished,
}

fn into_chat_stream(event_source: EventSource) -> ChatStream {
    let chunks = stream::unfold(StreamState::Open(event_source), |state| async move {
        let StreamState::Open(mut event_source) = state else {
            return None;
        };

        loop {
            match event_source.next().await {
                Some(Ok(Event::Open)) => {
                    debug!("open_router: completion stream opened");
                }
                Some(Ok(Event::Message(message))) => match parse_stream_data(&message.data) {
                    Ok(Some(chunk)) => return Some((Ok(chunk), StreamState::Open(event_source))),
                    Ok(None) => {
                        event_source.close();
                        return None;
                    }
                    Err(err) => {
                        event_source.close();
                        return Some((Err(err), StreamState::Finished));
                    }
                },
                Some(Err(reqwest_eventsource::Error::StreamEnded)) | None => {
                    event_source.close();
                    return None;
                }
                Some(Err(err)) => {
                    warn!(error = %err, "open_router: completion stream failed");
                    event_source.close();
                    return Some((
                        Err(anyhow!("completion stream failed: {}", err)),
                        StreamState::Finished,
                    ));
                }
            }
        }
    });

    Box::pin(chunks)
}

/// OpenRouter's OpenAI-compatible API.
pub struct OpenRouterClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenRouterClient {
    pub fn new(settings: OpenRouterSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert("HTTP-Referer", HeaderValue::from_str(&settings.referer)?);
        headers.insert("X-Title", HeaderValue::from_str(&settings.title)?);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base_url: settings
                .base_url
                .unwrap_or_else(|| DEFAULT_OPEN_ROUTER_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: settings.api_key,
        })
    }
}

#[async_trait]
impl LlmGateway for OpenRouterClient {
    async fn list_models(&self) -> Result<Vec<ModelSummary>> {
        let resp = self
            .http
            .get(format!("{}/models", self.base_url))
            .send()
            .await?;
        let resp = ensure_success(resp, PROVIDER, "list models").await?;

        let models: ModelsResponse = resp.json().await?;
        Ok(models.data)
    }

    async fn stream_chat_completion(&self, request: ChatCompletionRequest) -> Result<ChatStream> {
        let body = StreamingRequest {
            request: &request,
            stream: true,
        };

        let event_source = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .eventsource()
            .map_err(|err| anyhow!("failed to open completion stream: {}", err))?;

        info!(model = %request.model, "open_router: completion stream requested");
        Ok(into_chat_stream(event_source))
    }

    async fn generation_cost(&self, generation_id: &str) -> Result<Option<f64>> {
        let resp = self
            .http
            .get(format!("{}/generation", self.base_url))
            .query(&[("id", generation_id)])
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            debug!(%generation_id, "open_router: generation stats not ready");
            return Ok(None);
        }

        let resp = ensure_success(resp, PROVIDER, "generation stats").await?;
        let generation: GenerationResponse = resp.json().await?;

        Ok(generation.data.total_cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_delta_content_and_generation_id() {
        let chunk = parse_stream_data(
            r#"{"id":"gen_123","choices":[{"index":0,"delta":{"role":"assistant","content":"Hel"}}]}"#,
        )
        .unwrap()
        .unwrap();

        assert_eq!(chunk.generation_id.as_deref(), Some("gen_123"));
        assert_eq!(chunk.content, "Hel");
    }

    #[test]
    fn done_marker_ends_stream() {
        assert!(parse_stream_data(" [DONE] ").unwrap().is_none());
    }

    #[test]
    fn chunk_without_content_is_empty() {
        let chunk = parse_stream_data(r#"{"id":"gen_1","choices":[{"delta":{}}]}"#)
            .unwrap()
            .unwrap();

        assert!(chunk.content.is_empty());
    }

    #[test]
    fn inline_error_and_garbage_are_failures() {
        assert!(parse_stream_data(r#"{"error":{"message":"rate limited"}}"#).is_err());
        assert!(parse_stream_data("not json").is_err());
    }

    #[test]
    fn streaming_request_sets_stream_flag() {
        let request = ChatCompletionRequest {
            model: "openai/gpt-4o-mini".to_string(),
            messages: vec![],
            temperature: Some(0.2),
            top_p: None,
            max_tokens: None,
        };

        let json = serde_json::to_value(StreamingRequest {
            request: &request,
            stream: true,
        })
        .unwrap();

        assert_eq!(json["stream"], true);
        assert_eq!(json["model"], "openai/gpt-4o-mini");
        assert!(json.get("top_p").is_none());
    }

    #[test]
    fn generation_response_reads_total_cost() {
        let generation: GenerationResponse =
            serde_json::from_str(r#"{"data":{"id":"gen_123","total_cost":0.00042}}"#).unwrap();
        assert_eq!(generation.data.total_cost, Some(0.00042));
    }
}
