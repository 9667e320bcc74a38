pub mod checkout;
pub mod coupons;
pub mod enums;
pub mod payment_gateway;
pub mod payment_metadata;
pub mod payment_results;
pub mod plan_types;
pub mod priced_offers;
