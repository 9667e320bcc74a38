use serde::{Deserialize, Serialize};

use crate::domain::{entities::plans::PlanEntity, value_objects::coupons::CouponSummary};

/// Display currency for plans priced in toman.
pub const TOMAN: &str = "IRT";
/// The gateway only accepts rial.
pub const RIAL: &str = "IRR";
/// Fixed toman → rial multiplier.
pub const TOMAN_TO_RIAL: i64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppliedCoupon {
    pub code: String,
    pub discount_amount: i64,
    pub coupon: CouponSummary,
}

/// Server-computed price for a plan and optional coupon. Preview and commit both read from this.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PricedOffer {
    pub plan_id: uuid::Uuid,
    pub plan_slug: String,
    pub base_price: i64,
    pub discount_percentage: i32,
    pub discounted_price: i64,
    pub coupon: Option<AppliedCoupon>,
    pub final_price: i64,
    pub display_currency: String,
    pub gateway_amount: i64,
    pub gateway_currency: String,
    pub conversion_multiplier: i64,
}

impl PricedOffer {
    pub fn is_free(&self) -> bool {
        self.gateway_amount == 0
    }

    pub fn coupon_code(&self) -> Option<&str> {
        self.coupon.as_ref().map(|coupon| coupon.code.as_str())
    }
}

/// `price - price * pct / 100`, with the percentage clamped to 0..=100.
pub fn apply_plan_discount(price: i64, discount_percentage: Option<i32>) -> i64 {
    let percentage = i64::from(discount_percentage.unwrap_or(0).clamp(0, 100));
    let price = price.max(0);
    price - price * percentage / 100
}

/// Returns `(amount, currency, multiplier)` in the gateway's currency.
pub fn convert_for_gateway(final_price: i64, display_currency: &str) -> (i64, String, i64) {
    if display_currency.eq_ignore_ascii_case(TOMAN) {
        (final_price * TOMAN_TO_RIAL, RIAL.to_string(), TOMAN_TO_RIAL)
    } else {
        (final_price, display_currency.to_string(), 1)
    }
}

/// Assembles an offer from a plan's discounted price and an optional coupon verdict.
/// Negative results are clamped to zero.
pub fn build_offer(plan: &PlanEntity, coupon: Option<AppliedCoupon>) -> PricedOffer {
    let discount_percentage = plan.discount_percentage.unwrap_or(0).clamp(0, 100);
    let discounted_price = apply_plan_discount(plan.price, plan.discount_percentage);
    let coupon_discount = coupon
        .as_ref()
        .map(|coupon| coupon.discount_amount.max(0))
        .unwrap_or(0);
    let final_price = (discounted_price - coupon_discount).max(0);
    let (gateway_amount, gateway_currency, conversion_multiplier) =
        convert_for_gateway(final_price, &plan.currency);

    PricedOffer {
        plan_id: plan.id,
        plan_slug: plan.slug.clone(),
        base_price: plan.price,
        discount_percentage,
        discounted_price,
        coupon,
        final_price,
        display_currency: plan.currency.clone(),
        gateway_amount,
        gateway_currency,
        conversion_multiplier,
    }
}
