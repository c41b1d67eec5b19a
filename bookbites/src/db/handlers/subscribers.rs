//! Database repository for newsletter subscribers.

use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

use crate::db::errors::Result;
use crate::db::models::subscribers::{Subscriber, SubscriberStatus};

/// Repository for subscriber operations.
pub struct Subscribers<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Subscribers<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Insert a subscriber unless the address is already present.
    ///
    /// Returns `None` when the address exists; the unique constraint decides, so two racing
    /// requests for the same address cannot both succeed.
    #[instrument(skip(self, email), err)]
    pub async fn insert_if_absent(&mut self, email: &str) -> Result<Option<Subscriber>> {
        let subscriber = sqlx::query_as::<_, Subscriber>(
            r#"
            INSERT INTO newsletter_subscribers (id, email, status)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(SubscriberStatus::Active.as_str())
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(subscriber)
    }

    /// Get a subscriber by email.
    #[instrument(skip(self, email), err)]
    pub async fn get_by_email(&mut self, email: &str) -> Result<Option<Subscriber>> {
        let subscriber = sqlx::query_as::<_, Subscriber>(r#"SELECT * FROM newsletter_subscribers WHERE email = $1"#)
            .bind(email)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(subscriber)
    }

    /// Count all subscribers.
    #[instrument(skip(self), err)]
    pub async fn count(&mut self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM newsletter_subscribers"#)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }
}
