use std::pin::Pin;

use anyhow::Result;
use futures::Stream;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Client-supplied completion request. Always streamed upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ChatCompletionRequest {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("model is required".to_string());
        }
        if self.messages.is_empty() {
            return Err("messages must not be empty".to_string());
        }
        if let Some(message) = self
            .messages
            .iter()
            .find(|message| !matches!(message.role.as_str(), "system" | "user" | "assistant"))
        {
            return Err(format!("unsupported message role: {}", message.role));
        }
        Ok(())
    }
}

/// One streamed delta together with the upstream generation id it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatChunk {
    pub generation_id: Option<String>,
    pub content: String,
}

pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatChunk>> + Send>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub completion: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub context_length: Option<u64>,
    #[serde(default)]
    pub pricing: Option<ModelPricing>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(model: &str, roles: &[&str]) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: model.to_string(),
            messages: roles
                .iter()
                .map(|role| ChatMessage {
                    role: role.to_string(),
                    content: "hi".to_string(),
                })
                .collect(),
            temperature: None,
            top_p: None,
            max_tokens: None,
        }
    }

    #[test]
    fn validate_accepts_well_formed_request() {
        assert!(request("openai/gpt-4o-mini", &["system", "user"]).validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_model_or_messages() {
        assert!(request(" ", &["user"]).validate().is_err());
        assert!(request("openai/gpt-4o-mini", &[]).validate().is_err());
        assert!(request("openai/gpt-4o-mini", &["tool"]).validate().is_err());
    }
}
