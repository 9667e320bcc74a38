pub mod expire_pending_checkouts;
