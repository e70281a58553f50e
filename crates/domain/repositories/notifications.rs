use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::value_objects::notifications::EmailMessage;

#[automock]
#[async_trait]
pub trait NotificationSender {
    async fn send(&self, recipient: &str, message: EmailMessage) -> Result<()>;
}
