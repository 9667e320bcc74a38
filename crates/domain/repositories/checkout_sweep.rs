use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::payments::PaymentEntity;

#[automock]
#[async_trait]
pub trait CheckoutSweepRepository {
    async fn list_stale_pending_payments(
        &self,
        created_before: DateTime<Utc>,
        limit: Option<i64>,
    ) -> Result<Vec<PaymentEntity>>;

    /// Fails the payment and cancels its subscription, both only if still pending.
    /// Returns `false` when the payment had already been resolved.
    async fn abandon_pending_checkout(
        &self,
        payment_id: Uuid,
        subscription_id: Uuid,
        reason: &str,
    ) -> Result<bool>;

    /// Cancels pending subscriptions created before `created_before` whose payment already failed,
    /// e.g. after a gateway initiation failure. Returns the row count.
    async fn cancel_orphaned_subscriptions(
        &self,
        created_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<usize>;

    /// Marks active subscriptions whose `end_date` has passed as expired. Returns the row count.
    async fn expire_lapsed_subscriptions(&self, now: DateTime<Utc>) -> Result<usize>;
}
