use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::domain::value_objects::enums::{
    stores::Store, subscription_event_types::SubscriptionEventType,
};

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionWebhookPayload {
    #[serde(default)]
    pub api_version: Option<String>,
    pub event: SubscriptionEvent,
}

/// Lifecycle notification from the subscription-management service. Only the
/// fields the ledger and the notification emails need are decoded.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionEvent {
    #[serde(rename = "type")]
    pub type_: SubscriptionEventType,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub app_user_id: Option<String>,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub store: Option<Store>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub period_type: Option<String>,
    #[serde(default)]
    pub purchased_at_ms: Option<i64>,
    #[serde(default)]
    pub expiration_at_ms: Option<i64>,
    #[serde(default)]
    pub event_timestamp_ms: Option<i64>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub price_in_purchased_currency: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
}

impl SubscriptionEvent {
    /// The subscriber id, treating an empty string as missing.
    pub fn user_id(&self) -> Option<&str> {
        self.app_user_id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn purchased_at(&self) -> Option<DateTime<Utc>> {
        self.purchased_at_ms.and_then(ms_to_datetime)
    }

    pub fn expiration_at(&self) -> Option<DateTime<Utc>> {
        self.expiration_at_ms.and_then(ms_to_datetime)
    }

    pub fn event_at(&self) -> Option<DateTime<Utc>> {
        self.event_timestamp_ms.and_then(ms_to_datetime)
    }

    pub fn store(&self) -> Store {
        self.store.unwrap_or(Store::Unknown)
    }
}

fn ms_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    if ms <= 0 {
        return None;
    }
    Utc.timestamp_millis_opt(ms).single()
}
