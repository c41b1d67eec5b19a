//! Test utilities shared by the handler, worker and email tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum_test::TestServer;
use tempfile::TempDir;

use crate::config::{Config, DatabaseConfig, EmailTransportConfig, StorageConfig};
use crate::db::MemoryStore;
use crate::email::Mailer;
use crate::errors::Error;
use crate::storage::ImageStore;
use crate::{AppState, Application, build_router};

/// Config with every backend in memory and emails written under the returned temp dir.
///
/// The outbox worker is disabled; tests drive it with `OutboxWorker::tick` instead.
pub fn create_test_config() -> (Config, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");

    let mut config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database: DatabaseConfig::Memory,
        storage: StorageConfig::Memory,
        ..Default::default()
    };
    config.email.transport = EmailTransportConfig::File {
        path: dir.path().join("emails").to_string_lossy().into_owned(),
    };
    config.newsletter.outbox.enabled = false;

    (config, dir)
}

pub async fn create_test_app() -> (TestServer, TempDir) {
    create_test_app_with(|_| {}).await
}

pub async fn create_test_app_with<F>(configure: F) -> (TestServer, TempDir)
where
    F: FnOnce(&mut Config),
{
    let (server, _state, dir) = create_test_app_with_state(configure).await;
    (server, dir)
}

/// Like [`create_test_app_with`], also handing back the state so tests can inspect the store.
pub async fn create_test_app_with_state<F>(configure: F) -> (TestServer, AppState, TempDir)
where
    F: FnOnce(&mut Config),
{
    let (mut config, dir) = create_test_config();
    configure(&mut config);

    let app = Application::new(config).await.expect("Failed to create application");
    let state = app.state().clone();
    (app.into_test_server(), state, dir)
}

/// Test app serving from the given image store, for backends config alone cannot produce offline.
pub async fn create_test_app_with_images<F>(images: Arc<dyn ImageStore>, configure: F) -> (TestServer, TempDir)
where
    F: FnOnce(&mut Config),
{
    let (mut config, dir) = create_test_config();
    configure(&mut config);

    let state = AppState::builder()
        .config(config)
        .store(Arc::new(MemoryStore::new()))
        .images(images)
        .mailer(Arc::new(RecordingMailer::default()))
        .build();
    let router = build_router(&state).expect("Failed to build router");

    (TestServer::new(router.into_make_service()).expect("Failed to create test server"), dir)
}

/// Mailer that records recipients instead of sending, optionally failing every send.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingMailer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().expect("mailer lock poisoned").clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_welcome_email(&self, to_email: &str) -> Result<(), Error> {
        if self.fail {
            return Err(Error::Internal {
                operation: "send SMTP email: relay unavailable".to_string(),
            });
        }
        self.sent.lock().expect("mailer lock poisoned").push(to_email.to_string());
        Ok(())
    }
}
