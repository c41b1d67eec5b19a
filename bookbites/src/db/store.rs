//! Storage traits the HTTP layer and the outbox worker depend on.
//!
//! Two implementations exist: [`PostgresStore`](super::postgres::PostgresStore) for deployments
//! and [`MemoryStore`](super::memory::MemoryStore) for development and tests. Both give the same
//! guarantees: one subscriber per address, one review per slug, and a welcome email queued
//! atomically with each new subscriber.

use async_trait::async_trait;
use chrono::Duration;

use crate::db::errors::Result;
use crate::db::models::{
    outbox::OutboxEntry,
    profiles::{Profile, ProfileUpdateDBRequest},
    reviews::{Review, ReviewCreateDBRequest},
    subscribers::{Subscriber, SubscriberCreateDBRequest},
};
use crate::types::OutboxEntryId;

#[async_trait]
pub trait SubscriberStore: Send + Sync {
    /// Record a new subscriber and queue their welcome email in one atomic step.
    ///
    /// Returns `None`, writing nothing, when the address is already subscribed.
    async fn subscribe(&self, request: &SubscriberCreateDBRequest) -> Result<Option<Subscriber>>;

    async fn get_subscriber_by_email(&self, email: &str) -> Result<Option<Subscriber>>;

    async fn count_subscribers(&self) -> Result<i64>;
}

#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Claim up to `limit` due entries and hold them for `lease`.
    async fn claim_due(&self, limit: i64, lease: Duration) -> Result<Vec<OutboxEntry>>;

    async fn mark_sent(&self, id: OutboxEntryId) -> Result<OutboxEntry>;

    /// Record a failed attempt and schedule the next one per `retry_schedule`.
    async fn mark_failed(&self, id: OutboxEntryId, error: &str, current_attempt: i32, retry_schedule: &[i64]) -> Result<OutboxEntry>;

    async fn list_outbox_for(&self, recipient: &str) -> Result<Vec<OutboxEntry>>;
}

#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Create a review; a taken slug is a `DbError::UniqueViolation`.
    async fn create_review(&self, request: &ReviewCreateDBRequest) -> Result<Review>;

    async fn get_review_by_slug(&self, slug: &str) -> Result<Option<Review>>;

    /// All reviews, newest first.
    async fn list_reviews(&self) -> Result<Vec<Review>>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// All profiles in display order.
    async fn list_profiles(&self) -> Result<Vec<Profile>>;

    async fn get_profile_by_slug(&self, slug: &str) -> Result<Option<Profile>>;

    async fn update_profile(&self, slug: &str, request: &ProfileUpdateDBRequest) -> Result<Option<Profile>>;

    /// Insert a profile unless its id exists. Returns whether it was inserted.
    async fn insert_profile_if_absent(&self, profile: &Profile) -> Result<bool>;
}

/// Everything the application needs from its document store.
pub trait Store: SubscriberStore + OutboxStore + ReviewStore + ProfileStore {}

impl<T> Store for T where T: SubscriberStore + OutboxStore + ReviewStore + ProfileStore {}
