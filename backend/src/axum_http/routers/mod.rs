pub mod checkout;
pub mod payments;
