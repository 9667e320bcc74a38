pub mod checkout;
pub mod deep_links;
pub mod in_flight;
pub mod payment_callback;
pub mod price_calculator;
