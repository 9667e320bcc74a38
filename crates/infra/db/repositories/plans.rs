use anyhow::Result;
use async_trait::async_trait;
use diesel::{OptionalExtension, RunQueryDsl, prelude::*};
use std::sync::Arc;
use tokio::task;
use uuid::Uuid;

use crate::domain::{entities::plans::PlanEntity, repositories::plans::PlanRepository};
use crate::infra::db::postgres::{postgres_connection::PgPoolSquad, schema::subscription_plans};

pub struct PlanPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PlanPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PlanRepository for PlanPostgres {
    async fn find_active_by_id(&self, plan_id: Uuid) -> Result<Option<PlanEntity>> {
        let db_pool = Arc::clone(&self.db_pool);

        task::spawn_blocking(move || -> Result<Option<PlanEntity>> {
            let mut conn = db_pool.get()?;

            let plan = subscription_plans::table
                .filter(subscription_plans::id.eq(plan_id))
                .filter(subscription_plans::is_active.eq(true))
                .select(PlanEntity::as_select())
                .first::<PlanEntity>(&mut conn)
                .optional()?;

            Ok(plan)
        })
        .await?
    }

    async fn find_active_by_slug(&self, slug: &str) -> Result<Option<PlanEntity>> {
        let db_pool = Arc::clone(&self.db_pool);
        let slug = slug.to_string();

        task::spawn_blocking(move || -> Result<Option<PlanEntity>> {
            let mut conn = db_pool.get()?;

            let plan = subscription_plans::table
                .filter(subscription_plans::slug.eq(slug))
                .filter(subscription_plans::is_active.eq(true))
                .select(PlanEntity::as_select())
                .first::<PlanEntity>(&mut conn)
                .optional()?;

            Ok(plan)
        })
        .await?
    }

    async fn list_active_plans(&self) -> Result<Vec<PlanEntity>> {
        let db_pool = Arc::clone(&self.db_pool);

        task::spawn_blocking(move || -> Result<Vec<PlanEntity>> {
            let mut conn = db_pool.get()?;

            let plans = subscription_plans::table
                .filter(subscription_plans::is_active.eq(true))
                .order((
                    subscription_plans::duration_days.asc(),
                    subscription_plans::price.asc(),
                ))
                .select(PlanEntity::as_select())
                .load::<PlanEntity>(&mut conn)?;

            Ok(plans)
        })
        .await?
    }
}
