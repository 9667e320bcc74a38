use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::value_objects::coupons::CouponVerdict;

/// Coupon eligibility and discount pricing. `Err` means the service itself failed; a coupon the
/// user may not use is an `Ok(CouponVerdict::Rejected)`.
#[automock]
#[async_trait]
pub trait CouponValidator {
    async fn validate(&self, code: &str, user_id: Uuid, base_amount: i64)
    -> Result<CouponVerdict>;

    /// Counts one use of `code`. Returns `false` when the usage limit was already reached.
    async fn record_redemption(&self, code: &str) -> Result<bool>;
}
