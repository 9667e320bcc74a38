use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::{
    payments::{PaymentEntity, PendingPaymentDraft},
    subscriptions::{InsertSubscriptionEntity, SubscriptionEntity},
};

#[automock]
#[async_trait]
pub trait PaymentRepository {
    /// Inserts the pending subscription and then its payment in a single transaction.
    async fn create_pending_checkout(
        &self,
        subscription: InsertSubscriptionEntity,
        payment: PendingPaymentDraft,
    ) -> Result<(SubscriptionEntity, PaymentEntity)>;

    async fn find_by_id(&self, payment_id: Uuid) -> Result<Option<PaymentEntity>>;

    async fn find_by_transaction_id(&self, transaction_id: &str) -> Result<Option<PaymentEntity>>;

    /// Shallow-merges `patch` into `payment_metadata`.
    async fn merge_metadata(&self, payment_id: Uuid, patch: serde_json::Value) -> Result<()>;

    /// `pending` → `completed`. Returns `false` if the payment was no longer pending.
    async fn mark_completed(
        &self,
        payment_id: Uuid,
        gateway_reference: Option<String>,
    ) -> Result<bool>;

    /// `pending` → `failed`. Returns `false` if the payment was no longer pending.
    async fn mark_failed(&self, payment_id: Uuid, reason: &str) -> Result<bool>;
}
