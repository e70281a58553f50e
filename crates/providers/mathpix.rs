use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::ensure_success;
use crate::domain::{
    repositories::equation_ocr::EquationOcrProvider,
    value_objects::ocr::{EquationAppToken, EquationText, OcrImage},
};

const PROVIDER: &str = "mathpix";
pub const DEFAULT_MATHPIX_URL: &str = "https://api.mathpix.com/v3";

#[derive(Debug, Serialize)]
struct RecognitionOptions {
    math_inline_delimiters: [&'static str; 2],
    rm_spaces: bool,
}

impl Default for RecognitionOptions {
    fn default() -> Self {
        Self {
            math_inline_delimiters: ["$", "$"],
            rm_spaces: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AppTokenResponse {
    app_token: String,
    app_token_expires_at: i64,
    #[serde(default)]
    strokes_session_id: Option<String>,
}

pub struct MathpixClient {
    http: reqwest::Client,
    base_url: String,
    app_id: String,
    app_key: String,
}

impl MathpixClient {
    pub fn new(app_id: String, app_key: String, base_url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_MATHPIX_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            app_id,
            app_key,
        }
    }

    fn image_part(image: OcrImage) -> Result<Part> {
        let file_name = image
            .file_name
            .unwrap_or_else(|| "image".to_string());

        Part::bytes(image.bytes.to_vec())
            .file_name(file_name)
            .mime_str(&image.content_type)
            .context("invalid image content type")
    }
}

#[async_trait]
impl EquationOcrProvider for MathpixClient {
    async fn recognize(&self, image: OcrImage) -> Result<EquationText> {
        let options = serde_json::to_string(&RecognitionOptions::default())?;
        let form = Form::new()
            .part("file", Self::image_part(image)?)
            .text("options_json", options);

        let resp = self
            .http
            .post(format!("{}/text", self.base_url))
            .header("app_id", &self.app_id)
            .header("app_key", &self.app_key)
            .multipart(form)
            .send()
            .await?;
        let resp = ensure_success(resp, PROVIDER, "recognize equation").await?;

        let text: EquationText = resp.json().await?;
        Ok(text)
    }

    async fn issue_app_token(&self) -> Result<EquationAppToken> {
        let resp = self
            .http
            .post(format!("{}/app-tokens", self.base_url))
            .header("app_key", &self.app_key)
            .send()
            .await?;
        let resp = ensure_success(resp, PROVIDER, "issue app token").await?;

        let token: AppTokenResponse = resp.json().await?;
        info!(
            expires_at = token.app_token_expires_at,
            "mathpix: issued app token"
        );

        Ok(EquationAppToken {
            app_token: token.app_token,
            app_token_expires_at: token.app_token_expires_at,
            strokes_session_id: token.strokes_session_id,
            app_id: self.app_id.clone(),
        })
    }
}
