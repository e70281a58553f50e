use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::value_objects::enums::{
    subscription_event_types::SubscriptionEventType, verification_purposes::VerificationPurpose,
};

/// Details rendered into subscription lifecycle emails.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionEmailData {
    pub subscription_plan: String,
    pub transaction_id: String,
    pub purchase_time: String,
    pub expiration_time: String,
    pub price: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EmailMessage {
    SubscriptionEvent {
        event_type: SubscriptionEventType,
        details: SubscriptionEmailData,
    },
    VerificationCode {
        purpose: VerificationPurpose,
        code: String,
        expires_at: DateTime<Utc>,
    },
}

impl EmailMessage {
    pub fn subject(&self) -> &'static str {
        match self {
            EmailMessage::SubscriptionEvent { event_type, .. } => match event_type {
                SubscriptionEventType::InitialPurchase => "Thank you for your purchase!",
                SubscriptionEventType::Renewal => "Your subscription has been renewed!",
                SubscriptionEventType::Cancellation => "Your subscription has been canceled!",
                SubscriptionEventType::Expiration => "Your subscription has expired!",
                _ => "Your subscription has been updated",
            },
            EmailMessage::VerificationCode { purpose, .. } => match purpose {
                VerificationPurpose::ResetPassword => "Your LensQuery password reset code",
                VerificationPurpose::VerifyEmail => "Verify your LensQuery email address",
            },
        }
    }

    /// Only the four lifecycle events have templates.
    pub fn supports_event(event_type: SubscriptionEventType) -> bool {
        matches!(
            event_type,
            SubscriptionEventType::InitialPurchase
                | SubscriptionEventType::Renewal
                | SubscriptionEventType::Cancellation
                | SubscriptionEventType::Expiration
        )
    }
}
