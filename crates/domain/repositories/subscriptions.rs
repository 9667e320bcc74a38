use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::subscriptions::{InsertSubscriptionEntity, SubscriptionEntity};

#[automock]
#[async_trait]
pub trait SubscriptionRepository {
    async fn create(&self, subscription: InsertSubscriptionEntity) -> Result<SubscriptionEntity>;

    async fn find_by_id(&self, subscription_id: Uuid) -> Result<Option<SubscriptionEntity>>;

    /// Moves a `pending` subscription to `active`. Returns `false` when the row was not pending,
    /// which makes repeated activation a no-op.
    async fn activate_if_pending(&self, subscription_id: Uuid) -> Result<bool>;
}
