use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::entities::{payments::PaymentEntity, subscriptions::SubscriptionEntity};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SubscriptionSummaryDto {
    pub id: Uuid,
    pub plan_type: String,
    pub status: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub price: i64,
    pub currency: String,
}

impl From<SubscriptionEntity> for SubscriptionSummaryDto {
    fn from(value: SubscriptionEntity) -> Self {
        Self {
            id: value.id,
            plan_type: value.plan_type,
            status: value.status,
            start_date: value.start_date,
            end_date: value.end_date,
            price: value.price,
            currency: value.currency,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PaymentSummaryDto {
    pub payment_id: Uuid,
    pub transaction_id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub gateway_reference: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl From<&PaymentEntity> for PaymentSummaryDto {
    fn from(value: &PaymentEntity) -> Self {
        Self {
            payment_id: value.id,
            transaction_id: value.transaction_id.clone(),
            amount: value.amount,
            currency: value.currency.clone(),
            status: value.status.clone(),
            gateway_reference: value.gateway_reference.clone(),
            paid_at: value.paid_at,
        }
    }
}

/// Body of the result page when no deep link applies.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PaymentResultDto {
    pub success: bool,
    pub payment: Option<PaymentSummaryDto>,
    pub subscription: Option<SubscriptionSummaryDto>,
}
