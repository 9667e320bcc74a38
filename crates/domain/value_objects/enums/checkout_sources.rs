use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Where a checkout was started from. `App` results are delivered via deep link.
#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutSource {
    #[default]
    Web,
    App,
}

impl CheckoutSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutSource::Web => "web",
            CheckoutSource::App => "app",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "web" => Some(CheckoutSource::Web),
            "app" => Some(CheckoutSource::App),
            _ => None,
        }
    }
}

impl Display for CheckoutSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
