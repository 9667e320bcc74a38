use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{
    enums::checkout_sources::CheckoutSource, priced_offers::PricedOffer,
};

pub const AUTHORITY_KEY: &str = "authority";

/// Typed view over `payments.payment_metadata`. The column stays an open JSON object, so keys
/// written by other components survive a round trip through `extra`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentMetadata {
    #[serde(default)]
    pub source: CheckoutSource,
    #[serde(default)]
    pub return_scheme: Option<String>,
    #[serde(default)]
    pub episode_id: Option<String>,
    #[serde(default)]
    pub offer: Option<PricedOffer>,
    #[serde(default)]
    pub authority: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PaymentMetadata {
    pub fn new(
        source: CheckoutSource,
        return_scheme: Option<String>,
        episode_id: Option<String>,
        offer: PricedOffer,
    ) -> Self {
        Self {
            source,
            return_scheme,
            episode_id,
            offer: Some(offer),
            authority: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Lenient parse; an unreadable bag is treated as empty web metadata.
    pub fn from_value(value: &serde_json::Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_else(|_| Self {
            source: CheckoutSource::Web,
            return_scheme: None,
            episode_id: None,
            offer: None,
            authority: None,
            extra: serde_json::Map::new(),
        })
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
    }

    /// The app deep-link scheme, only when the checkout came from the app.
    pub fn app_return_scheme(&self) -> Option<&str> {
        match self.source {
            CheckoutSource::App => self
                .return_scheme
                .as_deref()
                .filter(|scheme| !scheme.is_empty()),
            CheckoutSource::Web => None,
        }
    }
}
