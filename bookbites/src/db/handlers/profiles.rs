//! Database repository for reviewer profiles.

use sqlx::PgConnection;
use tracing::instrument;

use crate::db::errors::Result;
use crate::db::models::profiles::{Profile, ProfileUpdateDBRequest};

/// Repository for profile operations.
pub struct Profiles<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Profiles<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// List profiles in display order.
    #[instrument(skip(self), err)]
    pub async fn list(&mut self) -> Result<Vec<Profile>> {
        let profiles = sqlx::query_as::<_, Profile>(r#"SELECT * FROM profiles ORDER BY display_order ASC, name ASC"#)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(profiles)
    }

    /// Get a profile by slug.
    #[instrument(skip(self), err)]
    pub async fn get_by_slug(&mut self, slug: &str) -> Result<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(r#"SELECT * FROM profiles WHERE slug = $1"#)
            .bind(slug)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(profile)
    }

    /// Update the editable fields of a profile.
    #[instrument(skip(self, request), err)]
    pub async fn update(&mut self, slug: &str, request: &ProfileUpdateDBRequest) -> Result<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            UPDATE profiles
            SET
                quote = COALESCE($2, quote),
                favorite_book = COALESCE($3, favorite_book),
                current_reading = COALESCE($4, current_reading)
            WHERE slug = $1
            RETURNING *
            "#,
        )
        .bind(slug)
        .bind(request.quote.as_deref())
        .bind(request.favorite_book.as_deref())
        .bind(request.current_reading.as_deref())
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(profile)
    }

    /// Insert a profile unless one with the same id exists. Returns whether a row was written.
    ///
    /// Existing rows are left alone so edits made through the API survive a restart.
    #[instrument(skip(self, profile), fields(profile_id = %profile.id), err)]
    pub async fn insert_if_absent(&mut self, profile: &Profile) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO profiles (id, name, slug, avatar, quote, favorite_book, current_reading, alignment, display_order, bio)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&profile.id)
        .bind(&profile.name)
        .bind(&profile.slug)
        .bind(&profile.avatar)
        .bind(&profile.quote)
        .bind(&profile.favorite_book)
        .bind(&profile.current_reading)
        .bind(&profile.alignment)
        .bind(profile.display_order)
        .bind(&profile.bio)
        .execute(&mut *self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
