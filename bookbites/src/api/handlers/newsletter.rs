use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use metrics::counter;

use crate::{
    AppState,
    api::models::{
        ErrorResponse, MessageResponse,
        newsletter::{NewsletterSignup, normalize_email},
    },
    db::{SubscriberStore, models::subscribers::SubscriberCreateDBRequest},
    errors::{Error, Result},
};

fn invalid_email() -> Error {
    Error::BadRequest {
        message: "Invalid email address".to_string(),
    }
}

#[utoipa::path(
    post,
    path = "/newsletter",
    tag = "newsletter",
    summary = "Subscribe to the newsletter",
    description = "Record a newsletter subscription and queue a welcome email. Each address can subscribe once.",
    request_body = NewsletterSignup,
    responses(
        (status = 200, description = "Subscribed", body = MessageResponse),
        (status = 400, description = "Invalid email address", body = ErrorResponse),
        (status = 409, description = "Already subscribed", body = ErrorResponse),
        (status = 500, description = "Subscription could not be stored", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn subscribe(
    State(state): State<AppState>,
    payload: std::result::Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<MessageResponse>> {
    let Json(body) = payload.map_err(|e| {
        tracing::debug!(error = %e, "Rejected newsletter signup body");
        invalid_email()
    })?;
    let signup = NewsletterSignup::try_from(body).map_err(|reason| {
        tracing::debug!(reason, "Rejected newsletter signup body");
        invalid_email()
    })?;
    let email = normalize_email(&signup.email).ok_or_else(invalid_email)?;

    let request = SubscriberCreateDBRequest {
        email,
        welcome_delay_secs: state.config.newsletter.outbox.retry_schedule_secs.first().copied().unwrap_or_default(),
    };

    let subscriber = state.store.subscribe(&request).await.map_err(|e| {
        counter!("bookbites_newsletter_signups_total", "outcome" => "error").increment(1);
        Error::unavailable("Failed to subscribe. Please try again later.", e)
    })?;

    let Some(subscriber) = subscriber else {
        counter!("bookbites_newsletter_signups_total", "outcome" => "duplicate").increment(1);
        return Err(Error::Conflict {
            message: "This email is already subscribed".to_string(),
        });
    };

    tracing::info!(subscriber_id = %crate::types::abbrev_uuid(&subscriber.id), "New newsletter subscriber");
    counter!("bookbites_newsletter_signups_total", "outcome" => "success").increment(1);

    Ok(Json(MessageResponse {
        message: "Successfully subscribed to newsletter!".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use crate::db::{OutboxStore, SubscriberStore};
    use crate::outbox::OutboxWorker;
    use crate::test_utils::{RecordingMailer, create_test_app_with_state};
    use axum::http::StatusCode;
    use serde_json::json;
    use std::sync::Arc;

    #[test_log::test(tokio::test)]
    async fn test_subscribe_then_duplicate() {
        let (server, state, _dir) = create_test_app_with_state(|_| {}).await;

        let response = server.post("/api/newsletter").json(&json!({ "email": "reader@example.com" })).await;
        response.assert_status_ok();
        response.assert_json(&json!({ "message": "Successfully subscribed to newsletter!" }));

        let response = server.post("/api/newsletter").json(&json!({ "email": "reader@example.com" })).await;
        response.assert_status(StatusCode::CONFLICT);
        response.assert_json(&json!({ "error": "This email is already subscribed" }));

        assert_eq!(state.store.count_subscribers().await.unwrap(), 1);
        assert_eq!(state.store.list_outbox_for("reader@example.com").await.unwrap().len(), 1);
    }

    #[test_log::test(tokio::test)]
    async fn test_duplicate_detection_ignores_case_and_whitespace() {
        let (server, state, _dir) = create_test_app_with_state(|_| {}).await;

        server
            .post("/api/newsletter")
            .json(&json!({ "email": "Reader@Example.com" }))
            .await
            .assert_status_ok();
        server
            .post("/api/newsletter")
            .json(&json!({ "email": "  reader@example.COM " }))
            .await
            .assert_status(StatusCode::CONFLICT);

        let subscriber = state.store.get_subscriber_by_email("reader@example.com").await.unwrap().unwrap();
        assert_eq!(subscriber.status, "active");
    }

    #[test_log::test(tokio::test)]
    async fn test_invalid_emails_rejected() {
        let (server, state, _dir) = create_test_app_with_state(|_| {}).await;

        for email in ["not-an-email", "", "a@b"] {
            let response = server.post("/api/newsletter").json(&json!({ "email": email })).await;
            response.assert_status(StatusCode::BAD_REQUEST);
            response.assert_json(&json!({ "error": "Invalid email address" }));
        }

        assert_eq!(state.store.count_subscribers().await.unwrap(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn test_malformed_bodies_rejected() {
        let (server, state, _dir) = create_test_app_with_state(|_| {}).await;

        for body in [json!({}), json!({ "email": 42 }), json!(["reader@example.com"]), json!("reader@example.com")] {
            let response = server.post("/api/newsletter").json(&body).await;
            response.assert_status(StatusCode::BAD_REQUEST);
            response.assert_json(&json!({ "error": "Invalid email address" }));
        }
        assert_eq!(state.store.count_subscribers().await.unwrap(), 0);

        let response = server.post("/api/newsletter").text("{not json").content_type("application/json").await;
        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({ "error": "Invalid email address" }));
    }

    #[test_log::test(tokio::test)]
    async fn test_signup_delivers_welcome_email_through_outbox() {
        let (server, state, _dir) = create_test_app_with_state(|_| {}).await;

        server
            .post("/api/newsletter")
            .json(&json!({ "email": "reader@example.com" }))
            .await
            .assert_status_ok();

        let mailer = Arc::new(RecordingMailer::default());
        let worker = OutboxWorker::new(state.store.clone(), mailer.clone(), &state.config.newsletter.outbox);
        assert_eq!(worker.tick().await.sent, 1);
        assert_eq!(mailer.sent(), vec!["reader@example.com".to_string()]);
    }

    #[test_log::test(tokio::test)]
    async fn test_mail_outage_does_not_fail_signup() {
        let (server, state, _dir) = create_test_app_with_state(|_| {}).await;

        server
            .post("/api/newsletter")
            .json(&json!({ "email": "reader@example.com" }))
            .await
            .assert_status_ok();

        let worker = OutboxWorker::new(state.store.clone(), Arc::new(RecordingMailer::failing()), &state.config.newsletter.outbox);
        assert_eq!(worker.tick().await.failed, 1);

        let entry = &state.store.list_outbox_for("reader@example.com").await.unwrap()[0];
        assert_eq!(entry.status, "failed");
        assert_eq!(entry.attempt_count, 1);
    }
}
