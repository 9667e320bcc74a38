use std::{sync::Arc, time::Duration};

use crates::domain::{
    entities::plans::PlanEntity,
    repositories::coupons::CouponValidator,
    value_objects::{
        coupons::CouponVerdict,
        priced_offers::{AppliedCoupon, PricedOffer, apply_plan_discount, build_offer},
    },
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const COUPON_SERVICE_UNAVAILABLE: &str = "coupon service unavailable";

#[derive(Debug, Error)]
pub enum PriceError {
    #[error("{0}")]
    CouponRejected(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Computes the authoritative price of a plan, asking the coupon service when a code is given.
pub struct PriceCalculator<C>
where
    C: CouponValidator + Send + Sync + 'static,
{
    coupon_validator: Arc<C>,
    coupon_timeout: Duration,
}

impl<C> PriceCalculator<C>
where
    C: CouponValidator + Send + Sync + 'static,
{
    pub fn new(coupon_validator: Arc<C>, coupon_timeout: Duration) -> Self {
        Self {
            coupon_validator,
            coupon_timeout,
        }
    }

    pub async fn price(
        &self,
        plan: &PlanEntity,
        coupon_code: Option<&str>,
        user_id: Uuid,
    ) -> Result<PricedOffer, PriceError> {
        let code = coupon_code.map(str::trim).filter(|code| !code.is_empty());

        let Some(code) = code else {
            return Ok(build_offer(plan, None));
        };

        let discounted = apply_plan_discount(plan.price, plan.discount_percentage);
        let verdict = tokio::time::timeout(
            self.coupon_timeout,
            self.coupon_validator.validate(code, user_id, discounted),
        )
        .await;

        match verdict {
            Ok(Ok(CouponVerdict::Accepted {
                discount_amount,
                coupon,
                ..
            })) => {
                info!(
                    %user_id,
                    plan_id = %plan.id,
                    coupon = %code,
                    discount_amount,
                    "pricing: coupon applied"
                );
                Ok(build_offer(
                    plan,
                    Some(AppliedCoupon {
                        code: code.to_string(),
                        discount_amount,
                        coupon,
                    }),
                ))
            }
            Ok(Ok(CouponVerdict::Rejected { message })) => {
                info!(%user_id, coupon = %code, reason = %message, "pricing: coupon rejected");
                Err(PriceError::CouponRejected(message))
            }
            Ok(Err(err)) => {
                error!(%user_id, coupon = %code, error = ?err, "pricing: coupon service failed");
                Err(PriceError::Internal(err))
            }
            Err(_) => {
                warn!(
                    %user_id,
                    coupon = %code,
                    timeout_ms = self.coupon_timeout.as_millis() as u64,
                    "pricing: coupon service timed out"
                );
                Err(PriceError::CouponRejected(
                    COUPON_SERVICE_UNAVAILABLE.to_string(),
                ))
            }
        }
    }

    pub async fn record_redemption(&self, offer: &PricedOffer, subscription_id: Uuid) {
        record_coupon_redemption(self.coupon_validator.as_ref(), offer, subscription_id).await;
    }
}

/// Counts the offer's coupon against its usage limit once the subscription it priced is active.
/// Failures are logged; the subscription stays active either way.
pub async fn record_coupon_redemption<C>(coupon_validator: &C, offer: &PricedOffer, subscription_id: Uuid)
where
    C: CouponValidator + Send + Sync,
{
    let Some(code) = offer.coupon_code() else {
        return;
    };

    match coupon_validator.record_redemption(code).await {
        Ok(true) => info!(%subscription_id, coupon = %code, "pricing: coupon redemption recorded"),
        Ok(false) => warn!(
            %subscription_id,
            coupon = %code,
            "pricing: coupon usage limit reached before redemption was recorded"
        ),
        Err(err) => error!(
            %subscription_id,
            coupon = %code,
            error = ?err,
            "pricing: failed to record coupon redemption"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use crates::domain::{
        repositories::coupons::MockCouponValidator,
        value_objects::{coupons::CouponSummary, enums::discount_types::DiscountType},
    };

    fn plan(price: i64, discount_percentage: Option<i32>) -> PlanEntity {
        PlanEntity {
            id: Uuid::new_v4(),
            slug: "1month".to_string(),
            name: "Monthly".to_string(),
            price,
            discount_percentage,
            duration_days: 30,
            currency: "IRT".to_string(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn accepted(discount_amount: i64, base: i64) -> CouponVerdict {
        CouponVerdict::Accepted {
            discount_amount,
            final_amount: base - discount_amount,
            coupon: CouponSummary {
                code: "SPRING".to_string(),
                discount_type: DiscountType::Fixed,
                discount_value: discount_amount,
            },
        }
    }

    fn calculator(validator: MockCouponValidator) -> PriceCalculator<MockCouponValidator> {
        PriceCalculator::new(Arc::new(validator), Duration::from_secs(2))
    }

    #[tokio::test]
    async fn no_coupon_skips_the_validator() {
        let mut validator = MockCouponValidator::new();
        validator.expect_validate().never();

        let offer = calculator(validator)
            .price(&plan(100_000, Some(10)), Some("   "), Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(offer.final_price, 90_000);
        assert_eq!(offer.gateway_amount, 900_000);
        assert!(offer.coupon.is_none());
    }

    #[tokio::test]
    async fn validator_sees_the_discounted_price() {
        let user_id = Uuid::new_v4();
        let mut validator = MockCouponValidator::new();
        validator
            .expect_validate()
            .withf(move |code, user, base| code == "SPRING" && *user == user_id && *base == 90_000)
            .times(1)
            .returning(|_, _, base| Ok(accepted(20_000, base)));

        let offer = calculator(validator)
            .price(&plan(100_000, Some(10)), Some(" SPRING "), user_id)
            .await
            .unwrap();

        assert_eq!(offer.final_price, 70_000);
        assert_eq!(offer.gateway_amount, 700_000);
        assert_eq!(offer.coupon_code(), Some("SPRING"));
    }

    #[tokio::test]
    async fn full_discount_coupon_yields_a_free_offer() {
        let mut validator = MockCouponValidator::new();
        validator
            .expect_validate()
            .withf(|code, _, base| code == "FREE100" && *base == 90_000)
            .returning(|_, _, base| Ok(accepted(base, base)));

        let offer = calculator(validator)
            .price(&plan(100_000, Some(10)), Some("FREE100"), Uuid::new_v4())
            .await
            .unwrap();

        assert!(offer.is_free());
        assert_eq!(offer.final_price, 0);
    }

    #[tokio::test]
    async fn rejected_coupon_is_a_typed_error() {
        let mut validator = MockCouponValidator::new();
        validator
            .expect_validate()
            .returning(|_, _, _| Ok(CouponVerdict::rejected("coupon has expired")));

        let err = calculator(validator)
            .price(&plan(100_000, None), Some("OLD"), Uuid::new_v4())
            .await
            .unwrap_err();

        assert!(matches!(err, PriceError::CouponRejected(message) if message == "coupon has expired"));
    }

    struct StalledCoupons;

    #[async_trait]
    impl CouponValidator for StalledCoupons {
        async fn validate(&self, _: &str, _: Uuid, _: i64) -> anyhow::Result<CouponVerdict> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(CouponVerdict::rejected("unreachable"))
        }

        async fn record_redemption(&self, _: &str) -> anyhow::Result<bool> {
            Ok(true)
        }
    }

    #[tokio::test]
    async fn slow_coupon_service_counts_as_rejection() {
        let calculator = PriceCalculator::new(Arc::new(StalledCoupons), Duration::from_millis(20));

        let err = calculator
            .price(&plan(100_000, None), Some("SLOW"), Uuid::new_v4())
            .await
            .unwrap_err();

        assert!(
            matches!(err, PriceError::CouponRejected(message) if message == COUPON_SERVICE_UNAVAILABLE)
        );
    }
}
