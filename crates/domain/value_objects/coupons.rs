use serde::{Deserialize, Serialize};

use crate::domain::value_objects::enums::discount_types::DiscountType;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CouponSummary {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
}

/// Answer from the coupon service. The service alone decides eligibility and discount size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CouponVerdict {
    Accepted {
        discount_amount: i64,
        final_amount: i64,
        coupon: CouponSummary,
    },
    Rejected {
        message: String,
    },
}

impl CouponVerdict {
    pub fn rejected(message: impl Into<String>) -> Self {
        CouponVerdict::Rejected {
            message: message.into(),
        }
    }
}
