//! Database repository for the email outbox.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

use crate::db::errors::Result;
use crate::db::models::outbox::{OutboxEntry, OutboxKind, OutboxStatus, next_after_failure};
use crate::types::{OutboxEntryId, SubscriberId, abbrev_uuid};

/// Repository for outbox operations.
pub struct Outbox<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Outbox<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Queue an email, due `delay_secs` from now.
    #[instrument(skip(self, recipient), fields(kind = kind.as_str()), err)]
    pub async fn enqueue(
        &mut self,
        kind: OutboxKind,
        recipient: &str,
        subscriber_id: Option<SubscriberId>,
        delay_secs: i64,
    ) -> Result<OutboxEntry> {
        let entry = sqlx::query_as::<_, OutboxEntry>(
            r#"
            INSERT INTO email_outbox (id, kind, recipient, subscriber_id, status, next_attempt_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(kind.as_str())
        .bind(recipient)
        .bind(subscriber_id)
        .bind(OutboxStatus::Pending.as_str())
        .bind(Utc::now() + Duration::seconds(delay_secs))
        .fetch_one(&mut *self.db)
        .await?;

        Ok(entry)
    }

    /// Claim entries that are due, pushing their next attempt out by `lease`.
    ///
    /// Rows locked by another worker are skipped, and the lease keeps them from being claimed
    /// again if this worker dies mid-send.
    #[instrument(skip(self), err)]
    pub async fn claim_due(&mut self, limit: i64, lease: Duration) -> Result<Vec<OutboxEntry>> {
        let lease_until: DateTime<Utc> = Utc::now() + lease;

        let entries = sqlx::query_as::<_, OutboxEntry>(
            r#"
            UPDATE email_outbox
            SET next_attempt_at = $2
            WHERE id IN (
                SELECT id FROM email_outbox
                WHERE status IN ('pending', 'failed')
                  AND next_attempt_at <= now()
                ORDER BY next_attempt_at ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(limit)
        .bind(lease_until)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(entries)
    }

    /// Mark an entry as sent.
    #[instrument(skip(self), fields(entry_id = %abbrev_uuid(&id)), err)]
    pub async fn mark_sent(&mut self, id: OutboxEntryId) -> Result<OutboxEntry> {
        let entry = sqlx::query_as::<_, OutboxEntry>(
            r#"
            UPDATE email_outbox
            SET
                status = $2,
                attempt_count = attempt_count + 1,
                sent_at = now(),
                last_error = NULL
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(OutboxStatus::Sent.as_str())
        .fetch_one(&mut *self.db)
        .await?;

        Ok(entry)
    }

    /// Mark an entry as failed and schedule the retry.
    #[instrument(skip(self, error, retry_schedule), fields(entry_id = %abbrev_uuid(&id)), err)]
    pub async fn mark_failed(
        &mut self,
        id: OutboxEntryId,
        error: &str,
        current_attempt: i32,
        retry_schedule: &[i64],
    ) -> Result<OutboxEntry> {
        let (new_attempt, new_status, next_attempt_at) = next_after_failure(current_attempt, retry_schedule, Utc::now());

        let entry = sqlx::query_as::<_, OutboxEntry>(
            r#"
            UPDATE email_outbox
            SET
                status = $2,
                attempt_count = $3,
                next_attempt_at = $4,
                last_error = $5
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(new_status.as_str())
        .bind(new_attempt)
        .bind(next_attempt_at)
        .bind(error)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(entry)
    }

    /// List entries addressed to a recipient, oldest first.
    #[instrument(skip(self, recipient), err)]
    pub async fn list_for_recipient(&mut self, recipient: &str) -> Result<Vec<OutboxEntry>> {
        let entries = sqlx::query_as::<_, OutboxEntry>(
            r#"
            SELECT * FROM email_outbox
            WHERE recipient = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(recipient)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(entries)
    }
}
