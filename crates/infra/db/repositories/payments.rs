use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use diesel::{Connection, OptionalExtension, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use tokio::task;
use uuid::Uuid;

use crate::{
    domain::{
        entities::{
            payments::{PaymentEntity, PendingPaymentDraft},
            subscriptions::{InsertSubscriptionEntity, SubscriptionEntity},
        },
        repositories::payments::PaymentRepository,
        value_objects::enums::payment_statuses::PaymentStatus,
    },
    infra::db::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{payments, subscriptions},
    },
};

pub struct PaymentPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PaymentRepository for PaymentPostgres {
    async fn create_pending_checkout(
        &self,
        subscription: InsertSubscriptionEntity,
        payment: PendingPaymentDraft,
    ) -> Result<(SubscriptionEntity, PaymentEntity)> {
        let db_pool = Arc::clone(&self.db_pool);

        task::spawn_blocking(move || -> Result<(SubscriptionEntity, PaymentEntity)> {
            let mut conn = db_pool.get()?;

            let created = conn.transaction::<_, diesel::result::Error, _>(|conn| {
                let subscription = insert_into(subscriptions::table)
                    .values(&subscription)
                    .returning(SubscriptionEntity::as_returning())
                    .get_result::<SubscriptionEntity>(conn)?;

                let payment = insert_into(payments::table)
                    .values(&payment.into_insert(subscription.id, PaymentStatus::Pending.as_str()))
                    .returning(PaymentEntity::as_returning())
                    .get_result::<PaymentEntity>(conn)?;

                Ok((subscription, payment))
            })?;

            Ok(created)
        })
        .await?
    }

    async fn find_by_id(&self, payment_id: Uuid) -> Result<Option<PaymentEntity>> {
        let db_pool = Arc::clone(&self.db_pool);

        task::spawn_blocking(move || -> Result<Option<PaymentEntity>> {
            let mut conn = db_pool.get()?;

            let payment = payments::table
                .filter(payments::id.eq(payment_id))
                .select(PaymentEntity::as_select())
                .first::<PaymentEntity>(&mut conn)
                .optional()?;

            Ok(payment)
        })
        .await?
    }

    async fn find_by_transaction_id(&self, transaction_id: &str) -> Result<Option<PaymentEntity>> {
        let db_pool = Arc::clone(&self.db_pool);
        let transaction_id = transaction_id.to_string();

        task::spawn_blocking(move || -> Result<Option<PaymentEntity>> {
            let mut conn = db_pool.get()?;

            let payment = payments::table
                .filter(payments::transaction_id.eq(transaction_id))
                .select(PaymentEntity::as_select())
                .first::<PaymentEntity>(&mut conn)
                .optional()?;

            Ok(payment)
        })
        .await?
    }

    async fn merge_metadata(&self, payment_id: Uuid, patch: serde_json::Value) -> Result<()> {
        let db_pool = Arc::clone(&self.db_pool);

        let serde_json::Value::Object(patch) = patch else {
            return Err(anyhow!("payment metadata patch must be a JSON object"));
        };

        task::spawn_blocking(move || -> Result<()> {
            let mut conn = db_pool.get()?;

            conn.transaction::<_, anyhow::Error, _>(|conn| {
                let current = payments::table
                    .filter(payments::id.eq(payment_id))
                    .select(payments::payment_metadata)
                    .for_update()
                    .first::<serde_json::Value>(conn)
                    .optional()?
                    .ok_or_else(|| anyhow!("payment {payment_id} not found"))?;

                let mut merged = match current {
                    serde_json::Value::Object(map) => map,
                    _ => serde_json::Map::new(),
                };
                merged.extend(patch);

                update(payments::table.filter(payments::id.eq(payment_id)))
                    .set((
                        payments::payment_metadata.eq(serde_json::Value::Object(merged)),
                        payments::updated_at.eq(Utc::now()),
                    ))
                    .execute(conn)?;

                Ok(())
            })
        })
        .await?
    }

    async fn mark_completed(
        &self,
        payment_id: Uuid,
        gateway_reference: Option<String>,
    ) -> Result<bool> {
        let db_pool = Arc::clone(&self.db_pool);

        task::spawn_blocking(move || -> Result<bool> {
            let mut conn = db_pool.get()?;
            let now = Utc::now();

            let updated = update(
                payments::table
                    .filter(payments::id.eq(payment_id))
                    .filter(payments::status.eq(PaymentStatus::Pending.as_str())),
            )
            .set((
                payments::status.eq(PaymentStatus::Completed.as_str()),
                payments::gateway_reference.eq(gateway_reference),
                payments::paid_at.eq(Some(now)),
                payments::updated_at.eq(now),
            ))
            .execute(&mut conn)?;

            Ok(updated == 1)
        })
        .await?
    }

    async fn mark_failed(&self, payment_id: Uuid, reason: &str) -> Result<bool> {
        let db_pool = Arc::clone(&self.db_pool);
        let reason = reason.to_string();

        task::spawn_blocking(move || -> Result<bool> {
            let mut conn = db_pool.get()?;

            let updated = update(
                payments::table
                    .filter(payments::id.eq(payment_id))
                    .filter(payments::status.eq(PaymentStatus::Pending.as_str())),
            )
            .set((
                payments::status.eq(PaymentStatus::Failed.as_str()),
                payments::failure_reason.eq(Some(reason)),
                payments::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

            Ok(updated == 1)
        })
        .await?
    }
}
