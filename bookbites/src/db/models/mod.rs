//! Database record structures matching table schemas.

pub mod outbox;
pub mod profiles;
pub mod reviews;
pub mod subscribers;
