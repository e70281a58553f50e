use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::value_objects::ocr::{DocumentText, LabelAnnotation, OcrImage};

#[automock]
#[async_trait]
pub trait VisionProvider {
    /// Detected text fragments; the first one is the full text.
    async fn detect_text(&self, image: OcrImage) -> Result<Vec<String>>;

    async fn detect_document_text(&self, image: OcrImage) -> Result<Option<DocumentText>>;

    async fn detect_labels(&self, image: OcrImage) -> Result<Vec<LabelAnnotation>>;
}
