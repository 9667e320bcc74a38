use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{Connection, RunQueryDsl, prelude::*, update};
use std::sync::Arc;
use tokio::task;
use uuid::Uuid;

use crate::{
    domain::{
        entities::payments::PaymentEntity,
        repositories::checkout_sweep::CheckoutSweepRepository,
        value_objects::enums::{
            payment_statuses::PaymentStatus, subscription_statuses::SubscriptionStatus,
        },
    },
    infra::db::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{payments, subscriptions},
    },
};

pub struct CheckoutSweepPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl CheckoutSweepPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl CheckoutSweepRepository for CheckoutSweepPostgres {
    async fn list_stale_pending_payments(
        &self,
        created_before: DateTime<Utc>,
        limit: Option<i64>,
    ) -> Result<Vec<PaymentEntity>> {
        let db_pool = Arc::clone(&self.db_pool);

        task::spawn_blocking(move || -> Result<Vec<PaymentEntity>> {
            let mut conn = db_pool.get()?;

            let mut query = payments::table
                .filter(payments::status.eq(PaymentStatus::Pending.as_str()))
                .filter(payments::created_at.lt(created_before))
                .order(payments::created_at.asc())
                .select(PaymentEntity::as_select())
                .into_boxed();

            if let Some(limit) = limit {
                query = query.limit(limit);
            }

            let stale = query.load::<PaymentEntity>(&mut conn)?;
            Ok(stale)
        })
        .await?
    }

    async fn abandon_pending_checkout(
        &self,
        payment_id: Uuid,
        subscription_id: Uuid,
        reason: &str,
    ) -> Result<bool> {
        let db_pool = Arc::clone(&self.db_pool);
        let reason = reason.to_string();

        task::spawn_blocking(move || -> Result<bool> {
            let mut conn = db_pool.get()?;

            let abandoned = conn.transaction::<_, diesel::result::Error, _>(|conn| {
                let now = Utc::now();

                let failed = update(
                    payments::table
                        .filter(payments::id.eq(payment_id))
                        .filter(payments::status.eq(PaymentStatus::Pending.as_str())),
                )
                .set((
                    payments::status.eq(PaymentStatus::Failed.as_str()),
                    payments::failure_reason.eq(Some(reason)),
                    payments::updated_at.eq(now),
                ))
                .execute(conn)?;

                if failed == 0 {
                    return Ok(false);
                }

                update(
                    subscriptions::table
                        .filter(subscriptions::id.eq(subscription_id))
                        .filter(subscriptions::status.eq(SubscriptionStatus::Pending.as_str())),
                )
                .set((
                    subscriptions::status.eq(SubscriptionStatus::Cancelled.as_str()),
                    subscriptions::updated_at.eq(now),
                ))
                .execute(conn)?;

                Ok(true)
            })?;

            Ok(abandoned)
        })
        .await?
    }

    async fn cancel_orphaned_subscriptions(
        &self,
        created_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let db_pool = Arc::clone(&self.db_pool);

        task::spawn_blocking(move || -> Result<usize> {
            let mut conn = db_pool.get()?;

            let failed_checkouts = payments::table
                .filter(payments::status.eq(PaymentStatus::Failed.as_str()))
                .select(payments::subscription_id);

            let cancelled = update(
                subscriptions::table
                    .filter(subscriptions::status.eq(SubscriptionStatus::Pending.as_str()))
                    .filter(subscriptions::created_at.lt(created_before))
                    .filter(subscriptions::id.eq_any(failed_checkouts)),
            )
            .set((
                subscriptions::status.eq(SubscriptionStatus::Cancelled.as_str()),
                subscriptions::updated_at.eq(now),
            ))
            .execute(&mut conn)?;

            Ok(cancelled)
        })
        .await?
    }

    async fn expire_lapsed_subscriptions(&self, now: DateTime<Utc>) -> Result<usize> {
        let db_pool = Arc::clone(&self.db_pool);

        task::spawn_blocking(move || -> Result<usize> {
            let mut conn = db_pool.get()?;

            let expired = update(
                subscriptions::table
                    .filter(subscriptions::status.eq(SubscriptionStatus::Active.as_str()))
                    .filter(subscriptions::end_date.lt(now)),
            )
            .set((
                subscriptions::status.eq(SubscriptionStatus::Expired.as_str()),
                subscriptions::updated_at.eq(now),
            ))
            .execute(&mut conn)?;

            Ok(expired)
        })
        .await?
    }
}
