//! In-process [`Store`](super::store::Store) for development and tests.
//!
//! State lives behind a single async mutex, which makes each operation atomic in the same way
//! a transaction does for the Postgres store. Nothing survives a restart.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::db::errors::{DbError, Result};
use crate::db::models::{
    outbox::{OutboxEntry, OutboxKind, OutboxStatus, next_after_failure},
    profiles::{Profile, ProfileUpdateDBRequest},
    reviews::{Review, ReviewCreateDBRequest},
    subscribers::{Subscriber, SubscriberCreateDBRequest, SubscriberStatus},
};
use crate::db::store::{OutboxStore, ProfileStore, ReviewStore, SubscriberStore};
use crate::types::OutboxEntryId;

#[derive(Debug, Default)]
struct MemoryState {
    /// Keyed by normalized email
    subscribers: HashMap<String, Subscriber>,
    /// In insertion order
    outbox: Vec<OutboxEntry>,
    /// Keyed by title slug
    reviews: HashMap<String, Review>,
    /// Keyed by id
    profiles: HashMap<String, Profile>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn outbox_entry_mut(state: &mut MemoryState, id: OutboxEntryId) -> Result<&mut OutboxEntry> {
    state.outbox.iter_mut().find(|entry| entry.id == id).ok_or(DbError::NotFound)
}

#[async_trait]
impl SubscriberStore for MemoryStore {
    async fn subscribe(&self, request: &SubscriberCreateDBRequest) -> Result<Option<Subscriber>> {
        let mut state = self.state.lock().await;
        if state.subscribers.contains_key(&request.email) {
            return Ok(None);
        }

        let now = Utc::now();
        let subscriber = Subscriber {
            id: Uuid::new_v4(),
            email: request.email.clone(),
            subscribed_at: now,
            status: SubscriberStatus::Active.as_str().to_string(),
        };

        state.outbox.push(OutboxEntry {
            id: Uuid::new_v4(),
            kind: OutboxKind::Welcome.as_str().to_string(),
            recipient: subscriber.email.clone(),
            subscriber_id: Some(subscriber.id),
            status: OutboxStatus::Pending.as_str().to_string(),
            attempt_count: 0,
            next_attempt_at: now + Duration::seconds(request.welcome_delay_secs),
            last_error: None,
            created_at: now,
            sent_at: None,
        });
        state.subscribers.insert(subscriber.email.clone(), subscriber.clone());

        Ok(Some(subscriber))
    }

    async fn get_subscriber_by_email(&self, email: &str) -> Result<Option<Subscriber>> {
        Ok(self.state.lock().await.subscribers.get(email).cloned())
    }

    async fn count_subscribers(&self) -> Result<i64> {
        Ok(self.state.lock().await.subscribers.len() as i64)
    }
}

#[async_trait]
impl OutboxStore for MemoryStore {
    async fn claim_due(&self, limit: i64, lease: Duration) -> Result<Vec<OutboxEntry>> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let lease_until = now + lease;

        let mut due: Vec<&mut OutboxEntry> = state
            .outbox
            .iter_mut()
            .filter(|entry| {
                (entry.status == OutboxStatus::Pending.as_str() || entry.status == OutboxStatus::Failed.as_str())
                    && entry.next_attempt_at <= now
            })
            .collect();
        due.sort_by_key(|entry| entry.next_attempt_at);

        let claimed = due
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|entry| {
                entry.next_attempt_at = lease_until;
                entry.clone()
            })
            .collect();

        Ok(claimed)
    }

    async fn mark_sent(&self, id: OutboxEntryId) -> Result<OutboxEntry> {
        let mut state = self.state.lock().await;
        let entry = outbox_entry_mut(&mut state, id)?;
        entry.status = OutboxStatus::Sent.as_str().to_string();
        entry.attempt_count += 1;
        entry.sent_at = Some(Utc::now());
        entry.last_error = None;
        Ok(entry.clone())
    }

    async fn mark_failed(&self, id: OutboxEntryId, error: &str, current_attempt: i32, retry_schedule: &[i64]) -> Result<OutboxEntry> {
        let mut state = self.state.lock().await;
        let entry = outbox_entry_mut(&mut state, id)?;
        let (new_attempt, new_status, next_attempt_at) = next_after_failure(current_attempt, retry_schedule, Utc::now());
        entry.status = new_status.as_str().to_string();
        entry.attempt_count = new_attempt;
        entry.next_attempt_at = next_attempt_at;
        entry.last_error = Some(error.to_string());
        Ok(entry.clone())
    }

    async fn list_outbox_for(&self, recipient: &str) -> Result<Vec<OutboxEntry>> {
        let state = self.state.lock().await;
        Ok(state.outbox.iter().filter(|entry| entry.recipient == recipient).cloned().collect())
    }
}

#[async_trait]
impl ReviewStore for MemoryStore {
    async fn create_review(&self, request: &ReviewCreateDBRequest) -> Result<Review> {
        let mut state = self.state.lock().await;
        if state.reviews.contains_key(&request.title_slug) {
            return Err(DbError::UniqueViolation {
                constraint: Some("reviews_title_slug_key".to_string()),
                table: Some("reviews".to_string()),
                message: format!("Key (title_slug)=({}) already exists.", request.title_slug),
            });
        }

        let review = Review {
            id: Uuid::new_v4(),
            title: request.title.clone(),
            title_slug: request.title_slug.clone(),
            rating: request.rating,
            review: request.review.clone(),
            categories: request.categories.clone(),
            meal: request.meal.clone(),
            author: request.author.clone(),
            image_url: request.image_url.clone(),
            created_at: Utc::now(),
        };
        state.reviews.insert(review.title_slug.clone(), review.clone());

        Ok(review)
    }

    async fn get_review_by_slug(&self, slug: &str) -> Result<Option<Review>> {
        Ok(self.state.lock().await.reviews.get(slug).cloned())
    }

    async fn list_reviews(&self) -> Result<Vec<Review>> {
        let state = self.state.lock().await;
        let mut reviews: Vec<Review> = state.reviews.values().cloned().collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reviews)
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        let state = self.state.lock().await;
        let mut profiles: Vec<Profile> = state.profiles.values().cloned().collect();
        profiles.sort_by(|a, b| a.display_order.cmp(&b.display_order).then_with(|| a.name.cmp(&b.name)));
        Ok(profiles)
    }

    async fn get_profile_by_slug(&self, slug: &str) -> Result<Option<Profile>> {
        let state = self.state.lock().await;
        Ok(state.profiles.values().find(|profile| profile.slug == slug).cloned())
    }

    async fn update_profile(&self, slug: &str, request: &ProfileUpdateDBRequest) -> Result<Option<Profile>> {
        let mut state = self.state.lock().await;
        let Some(profile) = state.profiles.values_mut().find(|profile| profile.slug == slug) else {
            return Ok(None);
        };

        if let Some(quote) = &request.quote {
            profile.quote = quote.clone();
        }
        if let Some(favorite_book) = &request.favorite_book {
            profile.favorite_book = favorite_book.clone();
        }
        if let Some(current_reading) = &request.current_reading {
            profile.current_reading = current_reading.clone();
        }

        Ok(Some(profile.clone()))
    }

    async fn insert_profile_if_absent(&self, profile: &Profile) -> Result<bool> {
        let mut state = self.state.lock().await;
        if state.profiles.contains_key(&profile.id) {
            return Ok(false);
        }
        if state.profiles.values().any(|existing| existing.slug == profile.slug) {
            return Err(DbError::UniqueViolation {
                constraint: Some("profiles_slug_key".to_string()),
                table: Some("profiles".to_string()),
                message: format!("Key (slug)=({}) already exists.", profile.slug),
            });
        }
        state.profiles.insert(profile.id.clone(), profile.clone());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::profiles::default_profiles;

    fn subscribe_request(email: &str) -> SubscriberCreateDBRequest {
        SubscriberCreateDBRequest {
            email: email.to_string(),
            welcome_delay_secs: 0,
        }
    }

    #[tokio::test]
    async fn test_subscribe_queues_one_welcome_email() {
        let store = MemoryStore::new();

        let subscriber = store.subscribe(&subscribe_request("reader@example.com")).await.unwrap().unwrap();
        assert_eq!(subscriber.status, "active");

        assert!(store.subscribe(&subscribe_request("reader@example.com")).await.unwrap().is_none());
        assert_eq!(store.count_subscribers().await.unwrap(), 1);

        let outbox = store.list_outbox_for("reader@example.com").await.unwrap();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].subscriber_id, Some(subscriber.id));
        assert_eq!(outbox[0].status, "pending");
    }

    #[tokio::test]
    async fn test_claim_respects_limit_and_lease() {
        let store = MemoryStore::new();
        for i in 0..3 {
            store.subscribe(&subscribe_request(&format!("r{i}@example.com"))).await.unwrap();
        }

        let first = store.claim_due(2, Duration::minutes(5)).await.unwrap();
        assert_eq!(first.len(), 2);
        let second = store.claim_due(10, Duration::minutes(5)).await.unwrap();
        assert_eq!(second.len(), 1);
        assert!(store.claim_due(10, Duration::minutes(5)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_entry_is_retried_then_exhausted() {
        let store = MemoryStore::new();
        store.subscribe(&subscribe_request("flaky@example.com")).await.unwrap();
        let entry = store.claim_due(1, Duration::minutes(5)).await.unwrap().remove(0);

        let failed = store.mark_failed(entry.id, "relay down", 0, &[0, 0]).await.unwrap();
        assert_eq!(failed.status, "failed");
        assert_eq!(failed.attempt_count, 1);

        // Zero delay, so it is due again straight away
        let entry = store.claim_due(1, Duration::minutes(5)).await.unwrap().remove(0);
        let exhausted = store.mark_failed(entry.id, "relay down", entry.attempt_count, &[0, 0]).await.unwrap();
        assert_eq!(exhausted.status, "exhausted");
        assert_eq!(exhausted.attempt_count, 2);
        assert!(store.claim_due(1, Duration::minutes(5)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_review_slug_rejected() {
        let store = MemoryStore::new();
        let request = ReviewCreateDBRequest {
            title: "Little Women".to_string(),
            title_slug: "little-women".to_string(),
            rating: 5,
            review: "A classic.".to_string(),
            categories: "Classic".to_string(),
            meal: "Apple pie".to_string(),
            author: "laure".to_string(),
            image_url: "1-little-women.jpg".to_string(),
        };

        store.create_review(&request).await.unwrap();
        let err = store.create_review(&request).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_profiles_seed_list_and_update() {
        let store = MemoryStore::new();
        for profile in default_profiles().iter().rev() {
            assert!(store.insert_profile_if_absent(profile).await.unwrap());
        }
        assert!(!store.insert_profile_if_absent(&default_profiles()[0]).await.unwrap());

        let names: Vec<String> = store.list_profiles().await.unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Ivana", "Laure", "Sandra"]);

        let updated = store
            .update_profile(
                "ivana",
                &ProfileUpdateDBRequest {
                    quote: Some("So many books, so little time".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.quote, "So many books, so little time");
        assert_eq!(updated.favorite_book, "Pride and Prejudice");

        assert!(store.update_profile("nobody", &ProfileUpdateDBRequest::default()).await.unwrap().is_none());
    }
}
