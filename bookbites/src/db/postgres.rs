//! PostgreSQL-backed [`Store`](super::store::Store).

use async_trait::async_trait;
use chrono::Duration;
use sqlx::PgPool;

use crate::db::errors::Result;
use crate::db::handlers::{Outbox, Profiles, Reviews, Subscribers};
use crate::db::models::{
    outbox::{OutboxEntry, OutboxKind},
    profiles::{Profile, ProfileUpdateDBRequest},
    reviews::{Review, ReviewCreateDBRequest},
    subscribers::{Subscriber, SubscriberCreateDBRequest},
};
use crate::db::store::{OutboxStore, ProfileStore, ReviewStore, SubscriberStore};
use crate::types::OutboxEntryId;

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriberStore for PostgresStore {
    async fn subscribe(&self, request: &SubscriberCreateDBRequest) -> Result<Option<Subscriber>> {
        let mut tx = self.pool.begin().await?;

        let Some(subscriber) = Subscribers::new(&mut tx).insert_if_absent(&request.email).await? else {
            // Nothing was written; dropping the transaction rolls it back
            return Ok(None);
        };

        Outbox::new(&mut tx)
            .enqueue(OutboxKind::Welcome, &subscriber.email, Some(subscriber.id), request.welcome_delay_secs)
            .await?;

        tx.commit().await?;
        Ok(Some(subscriber))
    }

    async fn get_subscriber_by_email(&self, email: &str) -> Result<Option<Subscriber>> {
        let mut conn = self.pool.acquire().await?;
        Subscribers::new(&mut conn).get_by_email(email).await
    }

    async fn count_subscribers(&self) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        Subscribers::new(&mut conn).count().await
    }
}

#[async_trait]
impl OutboxStore for PostgresStore {
    async fn claim_due(&self, limit: i64, lease: Duration) -> Result<Vec<OutboxEntry>> {
        let mut tx = self.pool.begin().await?;
        let entries = Outbox::new(&mut tx).claim_due(limit, lease).await?;
        tx.commit().await?;
        Ok(entries)
    }

    async fn mark_sent(&self, id: OutboxEntryId) -> Result<OutboxEntry> {
        let mut conn = self.pool.acquire().await?;
        Outbox::new(&mut conn).mark_sent(id).await
    }

    async fn mark_failed(&self, id: OutboxEntryId, error: &str, current_attempt: i32, retry_schedule: &[i64]) -> Result<OutboxEntry> {
        let mut conn = self.pool.acquire().await?;
        Outbox::new(&mut conn).mark_failed(id, error, current_attempt, retry_schedule).await
    }

    async fn list_outbox_for(&self, recipient: &str) -> Result<Vec<OutboxEntry>> {
        let mut conn = self.pool.acquire().await?;
        Outbox::new(&mut conn).list_for_recipient(recipient).await
    }
}

#[async_trait]
impl ReviewStore for PostgresStore {
    async fn create_review(&self, request: &ReviewCreateDBRequest) -> Result<Review> {
        let mut conn = self.pool.acquire().await?;
        Reviews::new(&mut conn).create(request).await
    }

    async fn get_review_by_slug(&self, slug: &str) -> Result<Option<Review>> {
        let mut conn = self.pool.acquire().await?;
        Reviews::new(&mut conn).get_by_slug(slug).await
    }

    async fn list_reviews(&self) -> Result<Vec<Review>> {
        let mut conn = self.pool.acquire().await?;
        Reviews::new(&mut conn).list().await
    }
}

#[async_trait]
impl ProfileStore for PostgresStore {
    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        let mut conn = self.pool.acquire().await?;
        Profiles::new(&mut conn).list().await
    }

    async fn get_profile_by_slug(&self, slug: &str) -> Result<Option<Profile>> {
        let mut conn = self.pool.acquire().await?;
        Profiles::new(&mut conn).get_by_slug(slug).await
    }

    async fn update_profile(&self, slug: &str, request: &ProfileUpdateDBRequest) -> Result<Option<Profile>> {
        let mut conn = self.pool.acquire().await?;
        Profiles::new(&mut conn).update(slug, request).await
    }

    async fn insert_profile_if_absent(&self, profile: &Profile) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        Profiles::new(&mut conn).insert_if_absent(profile).await
    }
}
