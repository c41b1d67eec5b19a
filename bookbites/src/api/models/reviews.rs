//! API request and response models for reviews.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::models::reviews::Review;
use crate::types::ReviewId;

/// Request to publish a review.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewCreate {
    pub title: String,
    /// Whole stars, 1 to 5
    pub rating: i32,
    pub review: String,
    #[serde(default)]
    pub categories: String,
    /// Food pairing
    #[serde(default)]
    pub meal: String,
    /// Reviewer profile id
    pub author: String,
    /// Uploaded cover image (filename or URL returned by `/api/upload`)
    pub image_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResponse {
    #[schema(value_type = String, format = "uuid")]
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

impl From<Review> for ReviewResponse {
    fn from(review: Review) -> Self {
        Self {
            id: review.id,
            title: review.title,
            title_slug: review.title_slug,
            rating: review.rating,
            review: review.review,
            categories: review.categories,
            meal: review.meal,
            author: review.author,
            image_url: review.image_url,
            created_at: review.created_at,
        }
    }
}
