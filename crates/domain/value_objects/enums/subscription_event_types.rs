use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionEventType {
    Test,
    InitialPurchase,
    Renewal,
    Cancellation,
    Uncancellation,
    NonRenewingPurchase,
    SubscriptionPaused,
    Expiration,
    BillingIssue,
    ProductChange,
    #[serde(other)]
    Unknown,
}

impl SubscriptionEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionEventType::Test => "TEST",
            SubscriptionEventType::InitialPurchase => "INITIAL_PURCHASE",
            SubscriptionEventType::Renewal => "RENEWAL",
            SubscriptionEventType::Cancellation => "CANCELLATION",
            SubscriptionEventType::Uncancellation => "UNCANCELLATION",
            SubscriptionEventType::NonRenewingPurchase => "NON_RENEWING_PURCHASE",
            SubscriptionEventType::SubscriptionPaused => "SUBSCRIPTION_PAUSED",
            SubscriptionEventType::Expiration => "EXPIRATION",
            SubscriptionEventType::BillingIssue => "BILLING_ISSUE",
            SubscriptionEventType::ProductChange => "PRODUCT_CHANGE",
            SubscriptionEventType::Unknown => "UNKNOWN",
        }
    }
}

impl Display for SubscriptionEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
