use anyhow::{Result, bail};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ensure_success;
use crate::domain::{
    repositories::vision::VisionProvider,
    value_objects::ocr::{
        DocumentBlock, DocumentPage, DocumentParagraph, DocumentText, DocumentWord,
        LabelAnnotation, OcrImage,
    },
};

const PROVIDER: &str = "google_vision";
const DEFAULT_VISION_URL: &str = "https://vision.googleapis.com/v1";
const MAX_TEXT_RESULTS: u32 = 10;

#[derive(Debug, Serialize)]
struct AnnotateRequest<'a> {
    requests: Vec<AnnotateImageRequest<'a>>,
}

#[derive(Debug, Serialize)]
struct AnnotateImageRequest<'a> {
    image: ImageContent,
    features: Vec<Feature<'a>>,
}

#[derive(Debug, Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Feature<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_results: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    #[serde(default)]
    text_annotations: Vec<EntityAnnotation>,
    #[serde(default)]
    full_text_annotation: Option<TextAnnotation>,
    #[serde(default)]
    label_annotations: Vec<EntityAnnotation>,
    #[serde(default)]
    error: Option<StatusError>,
}

#[derive(Debug, Deserialize)]
struct StatusError {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct EntityAnnotation {
    #[serde(default)]
    description: String,
    #[serde(default)]
    score: f64,
}

#[derive(Debug, Deserialize)]
struct TextAnnotation {
    #[serde(default)]
    text: String,
    #[serde(default)]
    pages: Vec<Page>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page {
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    width: i64,
    #[serde(default)]
    height: i64,
    #[serde(default)]
    blocks: Vec<Block>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Block {
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    block_type: Option<String>,
    #[serde(default)]
    paragraphs: Vec<Paragraph>,
}

#[derive(Debug, Deserialize)]
struct Paragraph {
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    words: Vec<Word>,
}

#[derive(Debug, Deserialize)]
struct Word {
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    symbols: Vec<Symbol>,
}

#[derive(Debug, Deserialize)]
struct Symbol {
    #[serde(default)]
    text: String,
}

impl From<TextAnnotation> for DocumentText {
    fn from(value: TextAnnotation) -> Self {
        let pages = value
            .pages
            .into_iter()
            .map(|page| DocumentPage {
                confidence: page.confidence,
                width: page.width,
                height: page.height,
                blocks: page
                    .blocks
                    .into_iter()
                    .map(|block| DocumentBlock {
                        confidence: block.confidence,
                        block_type: block.block_type.unwrap_or_else(|| "UNKNOWN".to_string()),
                        paragraphs: block
                            .paragraphs
                            .into_iter()
                            .map(|paragraph| DocumentParagraph {
                                confidence: paragraph.confidence,
                                words: paragraph
                                    .words
                                    .into_iter()
                                    .map(|word| DocumentWord {
                                        confidence: word.confidence,
                                        symbols: word
                                            .symbols
                                            .into_iter()
                                            .map(|symbol| symbol.text)
                                            .collect(),
                                    })
                                    .collect(),
                            })
                            .collect(),
                    })
                    .collect(),
            })
            .collect();

        Self {
            data: value.text,
            pages,
        }
    }
}

/// Google Cloud Vision `images:annotate` over REST with an API key.
pub struct GoogleVisionClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GoogleVisionClient {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_VISION_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key,
        }
    }

    async fn annotate(
        &self,
        image: &OcrImage,
        feature: &str,
        max_results: Option<u32>,
    ) -> Result<AnnotateImageResponse> {
        let body = AnnotateRequest {
            requests: vec![AnnotateImageRequest {
                image: ImageContent {
                    content: STANDARD.encode(&image.bytes),
                },
                features: vec![Feature {
                    kind: feature,
                    max_results,
                }],
            }],
        };

        let resp = self
            .http
            .post(format!("{}/images:annotate", self.base_url))
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;
        let resp = ensure_success(resp, PROVIDER, feature).await?;
        let annotated: AnnotateResponse = resp.json().await?;

        first_response(annotated)
    }
}

fn first_response(annotated: AnnotateResponse) -> Result<AnnotateImageResponse> {
    let response = annotated.responses.into_iter().next().unwrap_or_default();
    if let Some(error) = &response.error {
        bail!(
            "vision annotation failed with code {}: {}",
            error.code,
            error.message
        );
    }
    Ok(response)
}

#[async_trait]
impl VisionProvider for GoogleVisionClient {
    async fn detect_text(&self, image: OcrImage) -> Result<Vec<String>> {
        let response = self
            .annotate(&image, "TEXT_DETECTION", Some(MAX_TEXT_RESULTS))
            .await?;

        let texts: Vec<String> = response
            .text_annotations
            .into_iter()
            .map(|annotation| annotation.description)
            .collect();
        debug!(found = texts.len(), "google_vision: text detection finished");

        Ok(texts)
    }

    async fn detect_document_text(&self, image: OcrImage) -> Result<Option<DocumentText>> {
        let response = self
            .annotate(&image, "DOCUMENT_TEXT_DETECTION", None)
            .await?;

        Ok(response.full_text_annotation.map(DocumentText::from))
    }

    async fn detect_labels(&self, image: OcrImage) -> Result<Vec<LabelAnnotation>> {
        let response = self.annotate(&image, "LABEL_DETECTION", None).await?;

        Ok(response
            .label_annotations
            .into_iter()
            .map(|annotation| LabelAnnotation {
                description: annotation.description,
                score: annotation.score,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_annotation_joins_symbols_into_words() {
        let raw = r#"{
            "responses": [{
                "fullTextAnnotation": {
                    "text": "Hi there\n",
                    "pages": [{
                        "confidence": 0.98,
                        "width": 640,
                        "height": 480,
                        "blocks": [{
                            "confidence": 0.97,
                            "blockType": "TEXT",
                            "paragraphs": [{
                                "confidence": 0.96,
                                "words": [
                                    { "confidence": 0.95, "symbols": [{ "text": "H" }, { "text": "i" }] },
                                    { "confidence": 0.94, "symbols": [{ "text": "there" }] }
                                ]
                            }]
                        }]
                    }]
                }
            }]
        }"#;

        let annotated: AnnotateResponse = serde_json::from_str(raw).unwrap();
        let document = first_response(annotated)
            .unwrap()
            .full_text_annotation
            .map(DocumentText::from)
            .unwrap();

        assert_eq!(document.data, "Hi there\n");
        let page = &document.pages[0];
        assert_eq!((page.width, page.height), (640, 480));
        let block = &page.blocks[0];
        assert_eq!(block.block_type, "TEXT");
        let words: Vec<&str> = block.paragraphs[0]
            .words
            .iter()
            .map(|word| word.symbols.as_str())
            .collect();
        assert_eq!(words, vec!["Hi", "there"]);

        let rendered = serde_json::to_value(&document).unwrap();
        assert_eq!(rendered["pages"][0]["Blocks"][0]["BlockType"], "TEXT");
        assert_eq!(
            rendered["pages"][0]["Blocks"][0]["Paragraphs"][0]["Words"][0]["Symbols"],
            "Hi"
        );
    }

    #[test]
    fn empty_response_has_no_document() {
        let annotated: AnnotateResponse = serde_json::from_str(r#"{ "responses": [{}] }"#).unwrap();
        let response = first_response(annotated).unwrap();

        assert!(response.full_text_annotation.is_none());
        assert!(response.text_annotations.is_empty());
    }

    #[test]
    fn per_image_error_is_surfaced() {
        let annotated: AnnotateResponse = serde_json::from_str(
            r#"{ "responses": [{ "error": { "code": 3, "message": "Bad image data." } }] }"#,
        )
        .unwrap();

        let err = first_response(annotated).unwrap_err();
        assert!(err.to_string().contains("Bad image data."));
    }

    #[test]
    fn request_body_uses_vision_field_names() {
        let body = AnnotateRequest {
            requests: vec![AnnotateImageRequest {
                image: ImageContent {
                    content: STANDARD.encode(b"png"),
                },
                features: vec![Feature {
                    kind: "TEXT_DETECTION",
                    max_results: Some(10),
                }],
            }],
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["requests"][0]["image"]["content"], "cG5n");
        assert_eq!(json["requests"][0]["features"][0]["type"], "TEXT_DETECTION");
        assert_eq!(json["requests"][0]["features"][0]["maxResults"], 10);
    }
}
