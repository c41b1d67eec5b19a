//! Database models for book reviews.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::types::ReviewId;

/// Database model for a review.
#[derive(Debug, Clone, FromRow)]
pub struct Review {
    pub id: ReviewId,
    pub title: String,
    pub title_slug: String,
    pub rating: i32,
    pub review: String,
    pub categories: String,
    pub meal: String,
    pub author: String,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

/// Database request for creating a review.
#[derive(Debug, Clone)]
pub struct ReviewCreateDBRequest {
    pub title: String,
    pub title_slug: String,
    pub rating: i32,
    pub review: String,
    pub categories: String,
    pub meal: String,
    pub author: String,
    pub image_url: String,
}
