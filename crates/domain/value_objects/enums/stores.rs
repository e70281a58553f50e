use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Storefront a purchase was made in, as reported by the subscription webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Store {
    AppStore,
    PlayStore,
    MacAppStore,
    Amazon,
    Stripe,
    Promotional,
    #[serde(other)]
    Unknown,
}

impl Display for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let store = match self {
            Store::AppStore => "APP_STORE",
            Store::PlayStore => "PLAY_STORE",
            Store::MacAppStore => "MAC_APP_STORE",
            Store::Amazon => "AMAZON",
            Store::Stripe => "STRIPE",
            Store::Promotional => "PROMOTIONAL",
            Store::Unknown => "UNKNOWN",
        };
        write!(f, "{}", store)
    }
}
