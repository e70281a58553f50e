pub mod email_templates;
pub mod firebase;
pub mod google_vision;
pub mod mathpix;
pub mod open_router;
pub mod smtp_mailer;

use anyhow::Result;
use tracing::error;

/// Passes successful responses through; logs and fails on anything else.
pub(crate) async fn ensure_success(
    resp: reqwest::Response,
    provider: &'static str,
    context: &str,
) -> Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }

    let status = resp.status();
    let body = match resp.text().await {
        Ok(text) if !text.is_empty() => text,
        Ok(_) => "<empty response body>".to_string(),
        Err(err) => format!("<failed to read response body: {err}>"),
    };

    error!(
        provider,
        status = %status,
        response_body = %body,
        context = %context,
        "provider api request failed"
    );

    anyhow::bail!(
        "{} API request failed: {} (status {})",
        provider,
        context,
        status
    );
}
