pub mod zarinpal_client;
pub mod zarinpal_gateway;
