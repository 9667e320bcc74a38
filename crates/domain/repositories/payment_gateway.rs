use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::{
    entities::payments::PaymentEntity,
    value_objects::payment_gateway::{CallbackVerdict, GatewayInitiation},
};

#[automock]
#[async_trait]
pub trait PaymentGateway {
    /// Short provider name, recorded as the subscription's payment method.
    fn provider_name(&self) -> &'static str;

    async fn initiate(&self, payment: &PaymentEntity, description: &str)
    -> Result<GatewayInitiation>;

    /// Resolves raw callback parameters to the payment they refer to and reports whether the
    /// charge went through.
    async fn process_callback(&self, params: &HashMap<String, String>) -> Result<CallbackVerdict>;
}
