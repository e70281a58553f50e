use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Image uploaded for recognition.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrImage {
    pub bytes: Bytes,
    pub content_type: String,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentText {
    pub data: String,
    pub pages: Vec<DocumentPage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DocumentPage {
    pub confidence: f64,
    pub width: i64,
    pub height: i64,
    pub blocks: Vec<DocumentBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DocumentBlock {
    pub confidence: f64,
    pub block_type: String,
    pub paragraphs: Vec<DocumentParagraph>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DocumentParagraph {
    pub confidence: f64,
    pub words: Vec<DocumentWord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DocumentWord {
    pub confidence: f64,
    pub symbols: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelAnnotation {
    pub description: String,
    pub score: f64,
}

/// Equation recognition result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquationText {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub latex_styled: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub confidence_rate: Option<f64>,
    #[serde(default)]
    pub is_printed: Option<bool>,
    #[serde(default)]
    pub is_handwritten: Option<bool>,
}

/// Short-lived token letting the app call the equation OCR service directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquationAppToken {
    pub app_token: String,
    pub app_token_expires_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strokes_session_id: Option<String>,
    #[serde(default)]
    pub app_id: String,
}

/// Response body when recognition found nothing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoTextFound {
    pub message: &'static str,
}

impl Default for NoTextFound {
    fn default() -> Self {
        Self {
            message: "NO_TEXT_FOUND",
        }
    }
}
