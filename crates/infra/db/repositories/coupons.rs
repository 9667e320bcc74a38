use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{OptionalExtension, RunQueryDsl, define_sql_function, prelude::*, sql_types::Text};
use std::sync::Arc;
use tokio::task;
use tracing::warn;
use uuid::Uuid;

use crate::{
    domain::{
        entities::coupons::CouponEntity,
        repositories::coupons::CouponValidator,
        value_objects::{
            coupons::{CouponSummary, CouponVerdict},
            enums::discount_types::DiscountType,
        },
    },
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::coupons},
};

define_sql_function!(fn lower(x: Text) -> Text);

/// Coupon rules backed by the `coupons` table.
pub struct CouponPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl CouponPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<CouponEntity>> {
        let db_pool = Arc::clone(&self.db_pool);
        let code = code.trim().to_lowercase();

        task::spawn_blocking(move || -> Result<Option<CouponEntity>> {
            let mut conn = db_pool.get()?;

            let coupon = coupons::table
                .filter(lower(coupons::code).eq(code))
                .select(CouponEntity::as_select())
                .first::<CouponEntity>(&mut conn)
                .optional()?;

            Ok(coupon)
        })
        .await?
    }
}

#[async_trait]
impl CouponValidator for CouponPostgres {
    async fn validate(&self, code: &str, user_id: Uuid, base_amount: i64) -> Result<CouponVerdict> {
        let Some(coupon) = self.find_by_code(code).await? else {
            return Ok(CouponVerdict::rejected("coupon code not found"));
        };

        let verdict = evaluate_coupon(&coupon, base_amount, Utc::now());
        if let CouponVerdict::Rejected { message } = &verdict {
            warn!(%user_id, code = %coupon.code, reason = %message, "coupons: coupon rejected");
        }

        Ok(verdict)
    }

    async fn record_redemption(&self, code: &str) -> Result<bool> {
        let db_pool = Arc::clone(&self.db_pool);
        let code = code.trim().to_lowercase();

        task::spawn_blocking(move || -> Result<bool> {
            let mut conn = db_pool.get()?;

            let updated = diesel::update(
                coupons::table.filter(lower(coupons::code).eq(code)).filter(
                    coupons::usage_limit
                        .is_null()
                        .or(coupons::times_used.lt(coupons::usage_limit.assume_not_null())),
                ),
            )
            .set(coupons::times_used.eq(coupons::times_used + 1))
            .execute(&mut conn)?;

            Ok(updated == 1)
        })
        .await?
    }
}

/// Applies eligibility and discount rules to a loaded coupon.
pub fn evaluate_coupon(coupon: &CouponEntity, base_amount: i64, now: DateTime<Utc>) -> CouponVerdict {
    if !coupon.is_active {
        return CouponVerdict::rejected("coupon is no longer active");
    }
    if coupon.starts_at.is_some_and(|starts_at| now < starts_at) {
        return CouponVerdict::rejected("coupon is not active yet");
    }
    if coupon.expires_at.is_some_and(|expires_at| now >= expires_at) {
        return CouponVerdict::rejected("coupon has expired");
    }
    if coupon
        .usage_limit
        .is_some_and(|limit| coupon.times_used >= limit)
    {
        return CouponVerdict::rejected("coupon usage limit reached");
    }

    let Some(discount_type) = DiscountType::from_str(&coupon.discount_type) else {
        return CouponVerdict::rejected("coupon is misconfigured");
    };

    let base_amount = base_amount.max(0);
    let raw_discount = match discount_type {
        DiscountType::Percentage => {
            let percentage = coupon.discount_value.clamp(0, 100);
            let discount = base_amount * percentage / 100;
            match coupon.max_discount_amount {
                Some(cap) => discount.min(cap.max(0)),
                None => discount,
            }
        }
        DiscountType::Fixed => coupon.discount_value.max(0),
    };
    let discount_amount = raw_discount.min(base_amount);

    CouponVerdict::Accepted {
        discount_amount,
        final_amount: base_amount - discount_amount,
        coupon: CouponSummary {
            code: coupon.code.clone(),
            discount_type,
            discount_value: coupon.discount_value,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn coupon(discount_type: &str, discount_value: i64) -> CouponEntity {
        CouponEntity {
            id: Uuid::new_v4(),
            code: "NOWRUZ".to_string(),
            discount_type: discount_type.to_string(),
            discount_value,
            max_discount_amount: None,
            usage_limit: None,
            times_used: 0,
            starts_at: None,
            expires_at: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn accepted_discount(verdict: CouponVerdict) -> i64 {
        match verdict {
            CouponVerdict::Accepted {
                discount_amount, ..
            } => discount_amount,
            CouponVerdict::Rejected { message } => panic!("unexpected rejection: {message}"),
        }
    }

    #[test]
    fn percentage_coupon_respects_cap() {
        let mut capped = coupon("percentage", 50);
        capped.max_discount_amount = Some(20_000);

        assert_eq!(
            accepted_discount(evaluate_coupon(&capped, 90_000, Utc::now())),
            20_000
        );
        assert_eq!(
            accepted_discount(evaluate_coupon(&coupon("percentage", 50), 90_000, Utc::now())),
            45_000
        );
    }

    #[test]
    fn fixed_coupon_never_exceeds_base() {
        let verdict = evaluate_coupon(&coupon("fixed", 120_000), 90_000, Utc::now());
        match verdict {
            CouponVerdict::Accepted {
                discount_amount,
                final_amount,
                ..
            } => {
                assert_eq!(discount_amount, 90_000);
                assert_eq!(final_amount, 0);
            }
            CouponVerdict::Rejected { message } => panic!("unexpected rejection: {message}"),
        }
    }

    #[test]
    fn expired_and_exhausted_coupons_are_rejected() {
        let now = Utc::now();

        let mut expired = coupon("fixed", 1_000);
        expired.expires_at = Some(now - Duration::days(1));
        assert_eq!(
            evaluate_coupon(&expired, 10_000, now),
            CouponVerdict::rejected("coupon has expired")
        );

        let mut exhausted = coupon("fixed", 1_000);
        exhausted.usage_limit = Some(5);
        exhausted.times_used = 5;
        assert_eq!(
            evaluate_coupon(&exhausted, 10_000, now),
            CouponVerdict::rejected("coupon usage limit reached")
        );
    }

    #[test]
    fn inactive_future_and_unknown_type_are_rejected() {
        let now = Utc::now();

        let mut inactive = coupon("fixed", 1_000);
        inactive.is_active = false;
        assert!(matches!(
            evaluate_coupon(&inactive, 10_000, now),
            CouponVerdict::Rejected { .. }
        ));

        let mut future = coupon("fixed", 1_000);
        future.starts_at = Some(now + Duration::hours(2));
        assert!(matches!(
            evaluate_coupon(&future, 10_000, now),
            CouponVerdict::Rejected { .. }
        ));

        assert_eq!(
            evaluate_coupon(&coupon("bogus", 10), 10_000, now),
            CouponVerdict::rejected("coupon is misconfigured")
        );
    }
}
