//! Welcome email delivery: claim, send, record.
//!
//! ```text
//! worker.tick()
//!   ├─ store.claim_due()        // pending/failed rows whose next_attempt_at has passed,
//!   │                           // leased for LEASE so other replicas skip them
//!   └─ for each claimed entry:
//!        ├─ mailer.send_welcome_email()
//!        ├─ Ok  → store.mark_sent()
//!        └─ Err → store.mark_failed()   // reschedules, or exhausts past the retry schedule
//! ```
//!
//! Failures that no retry can fix, such as a recipient the mail library cannot parse, exhaust
//! the entry on the first attempt.
//!
//! A worker killed mid-send leaves its claims leased; they become claimable again when the
//! lease runs out.

use std::sync::Arc;

use chrono::Duration;
use lettre::Address;
use metrics::counter;
use tokio_util::sync::CancellationToken;

use crate::config::OutboxConfig;
use crate::db::{OutboxStore, Store};
use crate::db::models::outbox::{OutboxEntry, OutboxKind, OutboxStatus};
use crate::email::Mailer;

/// How long a claimed entry stays invisible to other claimers.
pub const LEASE_MINUTES: i64 = 5;

/// Counts from a single tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    pub claimed: usize,
    pub sent: usize,
    pub failed: usize,
    pub exhausted: usize,
}

enum DeliveryFailure {
    /// May succeed on a later attempt
    Transient(String),
    /// Will fail the same way every time
    Permanent(String),
}

pub struct OutboxWorker {
    store: Arc<dyn Store>,
    mailer: Arc<dyn Mailer>,
    retry_schedule: Vec<i64>,
    claim_batch_size: i64,
}

impl OutboxWorker {
    pub fn new(store: Arc<dyn Store>, mailer: Arc<dyn Mailer>, config: &OutboxConfig) -> Self {
        Self {
            store,
            mailer,
            retry_schedule: config.retry_schedule_secs.clone(),
            claim_batch_size: config.claim_batch_size,
        }
    }

    /// Run one delivery cycle.
    pub async fn tick(&self) -> TickSummary {
        tracing::debug!("Outbox worker tick");

        let entries = match self.store.claim_due(self.claim_batch_size, Duration::minutes(LEASE_MINUTES)).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to claim outbox entries");
                return TickSummary::default();
            }
        };

        let mut summary = TickSummary {
            claimed: entries.len(),
            ..Default::default()
        };
        if entries.is_empty() {
            return summary;
        }

        counter!("bookbites_outbox_claimed_total").increment(entries.len() as u64);
        tracing::debug!(count = entries.len(), "Claimed outbox entries");

        for entry in entries {
            match self.deliver(&entry).await {
                Ok(()) => {
                    counter!("bookbites_outbox_deliveries_total", "outcome" => "success").increment(1);
                    if let Err(e) = self.store.mark_sent(entry.id).await {
                        tracing::warn!(error = %e, entry_id = %entry.id, "Failed to mark outbox entry as sent");
                    }
                    summary.sent += 1;
                }
                Err(failure) => {
                    let (error, retry_schedule): (String, &[i64]) = match failure {
                        DeliveryFailure::Transient(error) => {
                            counter!("bookbites_outbox_deliveries_total", "outcome" => "failure").increment(1);
                            (error, self.retry_schedule.as_slice())
                        }
                        DeliveryFailure::Permanent(error) => {
                            counter!("bookbites_outbox_deliveries_total", "outcome" => "permanent_failure").increment(1);
                            (error, &[][..])
                        }
                    };
                    match self.store.mark_failed(entry.id, &error, entry.attempt_count, retry_schedule).await {
                        Ok(updated) if updated.status == OutboxStatus::Exhausted.as_str() => {
                            tracing::error!(
                                entry_id = %entry.id,
                                attempts = updated.attempt_count,
                                error = %error,
                                "Giving up on outbox entry"
                            );
                            summary.exhausted += 1;
                        }
                        Ok(updated) => {
                            tracing::warn!(
                                entry_id = %entry.id,
                                attempts = updated.attempt_count,
                                next_attempt_at = %updated.next_attempt_at,
                                error = %error,
                                "Outbox delivery failed, will retry"
                            );
                            summary.failed += 1;
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, entry_id = %entry.id, "Failed to mark outbox entry as failed");
                            summary.failed += 1;
                        }
                    }
                }
            }
        }

        summary
    }

    async fn deliver(&self, entry: &OutboxEntry) -> Result<(), DeliveryFailure> {
        let Some(kind) = OutboxKind::parse(&entry.kind) else {
            return Err(DeliveryFailure::Permanent(format!("unknown outbox entry kind '{}'", entry.kind)));
        };
        if let Err(e) = entry.recipient.parse::<Address>() {
            return Err(DeliveryFailure::Permanent(format!("invalid recipient address: {e}")));
        }

        match kind {
            OutboxKind::Welcome => self
                .mailer
                .send_welcome_email(&entry.recipient)
                .await
                .map_err(|e| DeliveryFailure::Transient(e.to_string())),
        }
    }

    /// Tick every `poll_interval` until `shutdown` is cancelled.
    pub async fn run(self, poll_interval: std::time::Duration, shutdown: CancellationToken) {
        tracing::info!(poll_interval = ?poll_interval, "Starting outbox worker");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(poll_interval) => {}
                _ = shutdown.cancelled() => {
                    tracing::info!("Outbox worker shutting down");
                    return;
                }
            }

            let summary = self.tick().await;
            if summary.claimed > 0 {
                tracing::info!(
                    sent = summary.sent,
                    failed = summary.failed,
                    exhausted = summary.exhausted,
                    "Processed outbox entries"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, SubscriberStore};
    use crate::db::models::subscribers::SubscriberCreateDBRequest;
    use crate::test_utils::RecordingMailer;

    fn config(retry_schedule_secs: Vec<i64>) -> OutboxConfig {
        OutboxConfig {
            retry_schedule_secs,
            ..Default::default()
        }
    }

    async fn store_with_subscriber(email: &str) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .subscribe(&SubscriberCreateDBRequest {
                email: email.to_string(),
                welcome_delay_secs: 0,
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_tick_sends_and_marks_sent() {
        let store = store_with_subscriber("reader@example.com").await;
        let mailer = Arc::new(RecordingMailer::default());
        let worker = OutboxWorker::new(store.clone(), mailer.clone(), &config(vec![0, 30]));

        let summary = worker.tick().await;
        assert_eq!(summary, TickSummary { claimed: 1, sent: 1, failed: 0, exhausted: 0 });
        assert_eq!(mailer.sent(), vec!["reader@example.com".to_string()]);

        let entries = store.list_outbox_for("reader@example.com").await.unwrap();
        assert_eq!(entries[0].status, "sent");
        assert!(entries[0].sent_at.is_some());

        // Nothing left to do
        assert_eq!(worker.tick().await.claimed, 0);
        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_failing_mailer_retries_then_exhausts() {
        let store = store_with_subscriber("bounce@example.com").await;
        let mailer = Arc::new(RecordingMailer::failing());
        let worker = OutboxWorker::new(store.clone(), mailer.clone(), &config(vec![0, 0]));

        let first = worker.tick().await;
        assert_eq!(first.failed, 1);
        let entry = &store.list_outbox_for("bounce@example.com").await.unwrap()[0];
        assert_eq!(entry.status, "failed");
        assert_eq!(entry.attempt_count, 1);
        assert!(entry.last_error.as_deref().is_some_and(|e| e.contains("relay unavailable")));

        let second = worker.tick().await;
        assert_eq!(second.exhausted, 1);
        let entry = &store.list_outbox_for("bounce@example.com").await.unwrap()[0];
        assert_eq!(entry.status, "exhausted");
        assert_eq!(entry.attempt_count, 2);

        assert_eq!(worker.tick().await.claimed, 0);
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_failure_reschedules_into_future() {
        let store = store_with_subscriber("later@example.com").await;
        let worker = OutboxWorker::new(store.clone(), Arc::new(RecordingMailer::failing()), &config(vec![0, 3600, 7200]));

        assert_eq!(worker.tick().await.failed, 1);
        // Next attempt is an hour away
        assert_eq!(worker.tick().await.claimed, 0);
    }

    #[tokio::test]
    async fn test_unparseable_recipient_exhausts_without_retry() {
        // Passes the signup format check but is not a valid mailbox address
        let store = store_with_subscriber("a,b@example.com").await;
        let mailer = Arc::new(RecordingMailer::default());
        let worker = OutboxWorker::new(store.clone(), mailer.clone(), &config(vec![0, 0, 0]));

        let summary = worker.tick().await;
        assert_eq!(summary, TickSummary { claimed: 1, sent: 0, failed: 0, exhausted: 1 });

        let entry = &store.list_outbox_for("a,b@example.com").await.unwrap()[0];
        assert_eq!(entry.status, "exhausted");
        assert_eq!(entry.attempt_count, 1);
        assert!(entry.last_error.as_deref().is_some_and(|e| e.contains("invalid recipient address")));
        assert!(mailer.sent().is_empty());

        assert_eq!(worker.tick().await.claimed, 0);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let store = Arc::new(MemoryStore::new());
        let worker = OutboxWorker::new(store, Arc::new(RecordingMailer::default()), &config(vec![0]));
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(worker.run(std::time::Duration::from_millis(10), shutdown.clone()));
        shutdown.cancel();

        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("worker should stop")
            .unwrap();
    }
}
