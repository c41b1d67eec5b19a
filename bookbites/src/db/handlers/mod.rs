//! Repository implementations, one per table.

pub mod outbox;
pub mod profiles;
pub mod reviews;
pub mod subscribers;

pub use outbox::Outbox;
pub use profiles::Profiles;
pub use reviews::Reviews;
pub use subscribers::Subscribers;
