use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::subscription_plans;

/// Plan reference data. Prices are in the plan's display currency.
#[derive(Debug, Clone, PartialEq, Eq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = subscription_plans)]
pub struct PlanEntity {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub price: i64,
    pub discount_percentage: Option<i32>,
    pub duration_days: i32,
    pub currency: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
