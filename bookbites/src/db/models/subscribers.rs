//! Database models for newsletter subscribers.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::types::SubscriberId;

/// Database model for a newsletter subscriber.
#[derive(Debug, Clone, FromRow)]
pub struct Subscriber {
    pub id: SubscriberId,
    pub email: String,
    pub subscribed_at: DateTime<Utc>,
    pub status: String,
}

/// Subscription status. Only `Active` is ever written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberStatus {
    Active,
    Inactive,
}

impl SubscriberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

/// Database request for creating a subscriber.
#[derive(Debug, Clone)]
pub struct SubscriberCreateDBRequest {
    /// Normalized (trimmed, lowercased) address
    pub email: String,
    /// Delay before the first welcome email attempt, in seconds
    pub welcome_delay_secs: i64,
}
