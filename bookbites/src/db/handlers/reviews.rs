//! Database repository for reviews.

use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

use crate::db::errors::Result;
use crate::db::models::reviews::{Review, ReviewCreateDBRequest};

/// Repository for review operations.
pub struct Reviews<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Reviews<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Create a review. A taken slug surfaces as `DbError::UniqueViolation`.
    #[instrument(skip(self, request), fields(slug = %request.title_slug), err)]
    pub async fn create(&mut self, request: &ReviewCreateDBRequest) -> Result<Review> {
        let review = sqlx::query_as::<_, Review>(
            r#"
            INSERT INTO reviews (id, title, title_slug, rating, review, categories, meal, author, image_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.title)
        .bind(&request.title_slug)
        .bind(request.rating)
        .bind(&request.review)
        .bind(&request.categories)
        .bind(&request.meal)
        .bind(&request.author)
        .bind(&request.image_url)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(review)
    }

    /// Get a review by its title slug.
    #[instrument(skip(self), err)]
    pub async fn get_by_slug(&mut self, slug: &str) -> Result<Option<Review>> {
        let review = sqlx::query_as::<_, Review>(r#"SELECT * FROM reviews WHERE title_slug = $1"#)
            .bind(slug)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(review)
    }

    /// List all reviews, newest first.
    #[instrument(skip(self), err)]
    pub async fn list(&mut self) -> Result<Vec<Review>> {
        let reviews = sqlx::query_as::<_, Review>(r#"SELECT * FROM reviews ORDER BY created_at DESC"#)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(reviews)
    }
}
