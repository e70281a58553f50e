use crate::domain::value_objects::{
    enums::{
        subscription_event_types::SubscriptionEventType,
        verification_purposes::VerificationPurpose,
    },
    notifications::{EmailMessage, SubscriptionEmailData},
};

/// Rendered email body in both flavours.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEmail {
    pub html: String,
    pub text: String,
}

pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn layout(heading: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\
<html><body style=\"font-family:Helvetica,Arial,sans-serif;color:#1f2328;\">\
<div style=\"max-width:560px;margin:0 auto;padding:24px;\">\
<h2>{}</h2>{}\
<p style=\"color:#656d76;font-size:12px;\">LensQuery</p>\
</div></body></html>",
        escape_html(heading),
        body
    )
}

fn subscription_intro(event_type: SubscriptionEventType) -> &'static str {
    match event_type {
        SubscriptionEventType::InitialPurchase => {
            "Thanks for subscribing to LensQuery. Your plan is now active."
        }
        SubscriptionEventType::Renewal => {
            "Your LensQuery subscription renewed and your balance has been refilled."
        }
        SubscriptionEventType::Cancellation => {
            "Your LensQuery subscription was canceled. You keep access until it expires."
        }
        SubscriptionEventType::Expiration => {
            "Your LensQuery subscription has expired. Renew any time to keep going."
        }
        _ => "Your LensQuery subscription was updated.",
    }
}

fn render_subscription(event_type: SubscriptionEventType, details: &SubscriptionEmailData) -> RenderedEmail {
    let rows = [
        ("Plan", &details.subscription_plan),
        ("Transaction", &details.transaction_id),
        ("Purchased", &details.purchase_time),
        ("Expires", &details.expiration_time),
        ("Price", &details.price),
    ];

    let table = rows
        .iter()
        .map(|(label, value)| {
            format!(
                "<tr><td style=\"padding:4px 12px 4px 0;\"><b>{}</b></td><td>{}</td></tr>",
                label,
                escape_html(value)
            )
        })
        .collect::<String>();
    let intro = subscription_intro(event_type);

    let html = layout(
        EmailMessage::SubscriptionEvent {
            event_type,
            details: details.clone(),
        }
        .subject(),
        &format!("<p>{intro}</p><table>{table}</table>"),
    );

    let text = std::iter::once(intro.to_string())
        .chain(rows.iter().map(|(label, value)| format!("{label}: {value}")))
        .collect::<Vec<_>>()
        .join("\n");

    RenderedEmail { html, text }
}

fn render_code(purpose: VerificationPurpose, code: &str, minutes_left: i64) -> RenderedEmail {
    let action = match purpose {
        VerificationPurpose::ResetPassword => "reset your password",
        VerificationPurpose::VerifyEmail => "verify your email address",
    };
    let heading = match purpose {
        VerificationPurpose::ResetPassword => "Password reset",
        VerificationPurpose::VerifyEmail => "Email verification",
    };

    let html = layout(
        heading,
        &format!(
            "<p>Use this code to {action}:</p>\
<p style=\"font-size:28px;letter-spacing:6px;\"><b>{}</b></p>\
<p>It expires in {minutes_left} minutes. If you did not ask for it, ignore this email.</p>",
            escape_html(code)
        ),
    );
    let text = format!(
        "Use this code to {action}: {code}\nIt expires in {minutes_left} minutes."
    );

    RenderedEmail { html, text }
}

pub fn render(message: &EmailMessage, now: chrono::DateTime<chrono::Utc>) -> RenderedEmail {
    match message {
        EmailMessage::SubscriptionEvent {
            event_type,
            details,
        } => render_subscription(*event_type, details),
        EmailMessage::VerificationCode {
            purpose,
            code,
            expires_at,
        } => {
            let minutes_left = (*expires_at - now).num_minutes().max(1);
            render_code(*purpose, code, minutes_left)
        }
    }
}
