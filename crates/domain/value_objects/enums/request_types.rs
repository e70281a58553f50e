use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Category of a gated request. Recorded on every usage history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    Text,
    Document,
    Label,
    Equation,
    Chat,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Text => "text",
            RequestType::Document => "document",
            RequestType::Label => "label",
            RequestType::Equation => "equation",
            RequestType::Chat => "chat",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "text" => Some(RequestType::Text),
            "document" => Some(RequestType::Document),
            "label" => Some(RequestType::Label),
            "equation" => Some(RequestType::Equation),
            "chat" => Some(RequestType::Chat),
            _ => None,
        }
    }
}

impl Display for RequestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
