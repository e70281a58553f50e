use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
};
use tracing::info;

use super::email_templates;
use crate::domain::{
    repositories::notifications::NotificationSender, value_objects::notifications::EmailMessage,
};

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Sender mailbox, e.g. `LensQuery <no-reply@lensquery.com>`.
    pub from: String,
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(settings: SmtpSettings) -> Result<Self> {
        let credentials = Credentials::new(settings.username.clone(), settings.password);

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            .map_err(|err| anyhow!("invalid smtp relay {}: {}", settings.host, err))?
            .port(settings.port)
            .credentials(credentials)
            .build();

        let from: Mailbox = settings
            .from
            .parse()
            .with_context(|| format!("invalid sender address: {}", settings.from))?;

        info!(
            host = %settings.host,
            port = settings.port,
            username = %settings.username,
            "smtp_mailer: transport ready"
        );

        Ok(Self { transport, from })
    }

    fn build_message(&self, recipient: &str, message: &EmailMessage) -> Result<Message> {
        let to: Mailbox = recipient
            .parse()
            .with_context(|| format!("invalid recipient address: {recipient}"))?;
        let rendered = email_templates::render(message, Utc::now());

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject())
            .multipart(
                MultiPart::alternative()
                    .singlepart(SinglePart::plain(rendered.text))
                    .singlepart(SinglePart::html(rendered.html)),
            )
            .context("failed to build email")
    }
}

#[async_trait]
impl NotificationSender for SmtpMailer {
    async fn send(&self, recipient: &str, message: EmailMessage) -> Result<()> {
        let email = self.build_message(recipient, &message)?;

        self.transport
            .send(email)
            .await
            .map_err(|err| anyhow!("smtp delivery failed: {}", err))?;

        info!(subject = %message.subject(), "smtp_mailer: email sent");
        Ok(())
    }
}
