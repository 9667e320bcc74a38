pub mod checkout_sweep;
pub mod coupons;
pub mod payments;
pub mod plans;
pub mod subscriptions;
