use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{OptionalExtension, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use tokio::task;
use uuid::Uuid;

use crate::{
    domain::{
        entities::subscriptions::{InsertSubscriptionEntity, SubscriptionEntity},
        repositories::subscriptions::SubscriptionRepository,
        value_objects::enums::subscription_statuses::SubscriptionStatus,
    },
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::subscriptions},
};

pub struct SubscriptionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SubscriptionRepository for SubscriptionPostgres {
    async fn create(&self, subscription: InsertSubscriptionEntity) -> Result<SubscriptionEntity> {
        let db_pool = Arc::clone(&self.db_pool);

        task::spawn_blocking(move || -> Result<SubscriptionEntity> {
            let mut conn = db_pool.get()?;

            let created = insert_into(subscriptions::table)
                .values(&subscription)
                .returning(SubscriptionEntity::as_returning())
                .get_result::<SubscriptionEntity>(&mut conn)?;

            Ok(created)
        })
        .await?
    }

    async fn find_by_id(&self, subscription_id: Uuid) -> Result<Option<SubscriptionEntity>> {
        let db_pool = Arc::clone(&self.db_pool);

        task::spawn_blocking(move || -> Result<Option<SubscriptionEntity>> {
            let mut conn = db_pool.get()?;

            let subscription = subscriptions::table
                .filter(subscriptions::id.eq(subscription_id))
                .select(SubscriptionEntity::as_select())
                .first::<SubscriptionEntity>(&mut conn)
                .optional()?;

            Ok(subscription)
        })
        .await?
    }

    async fn activate_if_pending(&self, subscription_id: Uuid) -> Result<bool> {
        let db_pool = Arc::clone(&self.db_pool);

        task::spawn_blocking(move || -> Result<bool> {
            let mut conn = db_pool.get()?;

            let updated = update(
                subscriptions::table
                    .filter(subscriptions::id.eq(subscription_id))
                    .filter(subscriptions::status.eq(SubscriptionStatus::Pending.as_str())),
            )
            .set((
                subscriptions::status.eq(SubscriptionStatus::Active.as_str()),
                subscriptions::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

            Ok(updated == 1)
        })
        .await?
    }
}
