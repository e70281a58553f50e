use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::value_objects::ocr::{EquationAppToken, EquationText, OcrImage};

#[automock]
#[async_trait]
pub trait EquationOcrProvider {
    async fn recognize(&self, image: OcrImage) -> Result<EquationText>;

    async fn issue_app_token(&self) -> Result<EquationAppToken>;
}
