pub mod checkout_actions;
pub mod checkout_sources;
pub mod discount_types;
pub mod payment_statuses;
pub mod subscription_statuses;
