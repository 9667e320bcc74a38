use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutAction {
    /// Price the selection without persisting anything.
    ApplyCoupon,
    #[default]
    Pay,
}

impl CheckoutAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutAction::ApplyCoupon => "apply_coupon",
            CheckoutAction::Pay => "pay",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim() {
            "apply_coupon" => Some(CheckoutAction::ApplyCoupon),
            "pay" => Some(CheckoutAction::Pay),
            _ => None,
        }
    }
}

impl Display for CheckoutAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
