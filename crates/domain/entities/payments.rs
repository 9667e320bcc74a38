use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::payments;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = payments)]
pub struct PaymentEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subscription_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub transaction_id: String,
    pub payment_metadata: serde_json::Value,
    pub gateway_reference: Option<String>,
    pub failure_reason: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = payments)]
pub struct InsertPaymentEntity {
    pub user_id: Uuid,
    pub subscription_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub transaction_id: String,
    pub payment_metadata: serde_json::Value,
}

/// A payment waiting for the id of the subscription it is created alongside.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPaymentDraft {
    pub user_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub transaction_id: String,
    pub payment_metadata: serde_json::Value,
}

impl PendingPaymentDraft {
    pub fn into_insert(self, subscription_id: Uuid, status: &str) -> InsertPaymentEntity {
        InsertPaymentEntity {
            user_id: self.user_id,
            subscription_id,
            amount: self.amount,
            currency: self.currency,
            status: status.to_string(),
            transaction_id: self.transaction_id,
            payment_metadata: self.payment_metadata,
        }
    }
}
