//! Database models for the email outbox.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::types::{OutboxEntryId, SubscriberId};

/// Database model for a queued email.
#[derive(Debug, Clone, FromRow)]
pub struct OutboxEntry {
    pub id: OutboxEntryId,
    pub kind: String,
    pub recipient: String,
    pub subscriber_id: Option<SubscriberId>,
    pub status: String,
    pub attempt_count: i32,
    pub next_attempt_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

/// Delivery status for outbox entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxStatus {
    /// Waiting for the first attempt
    Pending,
    /// Delivered to the mail relay
    Sent,
    /// Failed but will retry
    Failed,
    /// All retries used up
    Exhausted,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Exhausted => "exhausted",
        }
    }
}

/// What kind of email an entry produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxKind {
    Welcome,
}

impl OutboxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Welcome => "welcome",
        }
    }

    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "welcome" => Some(Self::Welcome),
            _ => None,
        }
    }
}

/// Outcome of a failed attempt: the entry's next status and when it becomes due again.
///
/// `retry_schedule[n]` is the delay before attempt `n + 1`, so the schedule length is the
/// maximum number of attempts.
pub fn next_after_failure(current_attempt: i32, retry_schedule: &[i64], now: DateTime<Utc>) -> (i32, OutboxStatus, DateTime<Utc>) {
    let new_attempt = current_attempt + 1;

    if new_attempt as usize >= retry_schedule.len() {
        (new_attempt, OutboxStatus::Exhausted, now)
    } else {
        let delay_secs = retry_schedule.get(new_attempt as usize).copied().unwrap_or_default();
        (new_attempt, OutboxStatus::Failed, now + chrono::Duration::seconds(delay_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_after_failure_follows_schedule() {
        let now = Utc::now();
        let schedule = [0, 30, 300];

        let (attempt, status, due) = next_after_failure(0, &schedule, now);
        assert_eq!(attempt, 1);
        assert_eq!(status, OutboxStatus::Failed);
        assert_eq!(due, now + chrono::Duration::seconds(30));

        let (attempt, status, due) = next_after_failure(1, &schedule, now);
        assert_eq!(attempt, 2);
        assert_eq!(status, OutboxStatus::Failed);
        assert_eq!(due, now + chrono::Duration::seconds(300));

        let (attempt, status, _) = next_after_failure(2, &schedule, now);
        assert_eq!(attempt, 3);
        assert_eq!(status, OutboxStatus::Exhausted);
    }

    #[test]
    fn test_single_entry_schedule_exhausts_immediately() {
        let (_, status, _) = next_after_failure(0, &[0], Utc::now());
        assert_eq!(status, OutboxStatus::Exhausted);
    }
}
