//! # bookbites: Books&Bites backend
//!
//! `bookbites` serves the small HTTP API behind the Books&Bites site: image uploads for review
//! covers, newsletter signups with a welcome email, and the reviews and reviewer profiles the
//! frontend renders.
//!
//! ## Architecture
//!
//! The crate follows a layered layout:
//!
//! - **API layer** ([`api`]): Axum handlers and their request/response models
//! - **Store layer** ([`db`]): document store traits with PostgreSQL and in-memory backends
//! - **Image storage** ([`storage`]): uploaded files on local disk, S3-compatible storage or memory
//! - **Email** ([`email`]) and **outbox** ([`outbox`]): welcome emails are recorded in the same
//!   transaction as the subscriber and delivered by a background worker with retries
//!
//! ### Request flow
//!
//! ```text
//! POST /api/newsletter
//!   ├─ validate + normalise email
//!   ├─ store.subscribe()          // subscriber + outbox row, one transaction
//!   └─ 200 {"message": ...}
//!
//! OutboxWorker (background)
//!   └─ claim due rows → send welcome email → mark sent / reschedule
//! ```
//!
//! ## Configuration
//!
//! Configuration is loaded from a YAML file (default `config.yaml`) and `BOOKBITES_`-prefixed
//! environment variables, nested with `__`. `DATABASE_URL` switches the store to PostgreSQL.
//! See [`config::Config`].
//!
//! ## Running
//!
//! ```no_run
//! use bookbites::{Application, Config};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::default();
//! let app = Application::new(config).await?;
//! app.serve(async { tokio::signal::ctrl_c().await.ok(); }).await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod db;
pub mod email;
pub mod errors;
mod openapi;
pub mod outbox;
pub mod storage;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{self, HeaderValue},
    routing::{get, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use config::Config;
use config::{CorsOrigin, DatabaseConfig, PoolSettings};
use db::{MemoryStore, PostgresStore, ProfileStore, Store, models::profiles::default_profiles};
use email::{EmailService, Mailer};
use openapi::ApiDoc;
use outbox::OutboxWorker;
use storage::{ImageStore, ObjectImageStore};

/// Multipart framing allowance on top of `uploads.max_file_size`.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Application state shared across all request handlers.
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .store(store)
///     .images(images)
///     .mailer(mailer)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub images: Arc<dyn ImageStore>,
    pub mailer: Arc<dyn Mailer>,
}

/// Get the bookbites database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Insert the default reviewer profiles that are not there yet.
///
/// Existing profiles are left untouched so edits made through the API survive restarts.
pub async fn seed_profiles(store: &dyn Store) -> anyhow::Result<()> {
    let mut inserted = 0;
    for profile in default_profiles() {
        if store.insert_profile_if_absent(&profile).await? {
            inserted += 1;
        }
    }
    info!(inserted, "Seeded reviewer profiles");
    Ok(())
}

fn pool_options(settings: &PoolSettings) -> PgPoolOptions {
    let mut options = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs));

    // 0 means never
    if settings.idle_timeout_secs > 0 {
        options = options.idle_timeout(Duration::from_secs(settings.idle_timeout_secs));
    }
    if settings.max_lifetime_secs > 0 {
        options = options.max_lifetime(Duration::from_secs(settings.max_lifetime_secs));
    }
    options
}

/// Build the document store, connecting and migrating when it is PostgreSQL-backed.
///
/// Returns the pool alongside the store so the application can close it on shutdown.
#[instrument(skip_all)]
pub async fn setup_store(config: &Config) -> anyhow::Result<(Arc<dyn Store>, Option<PgPool>)> {
    let (store, pool): (Arc<dyn Store>, Option<PgPool>) = match &config.database {
        DatabaseConfig::Memory => {
            info!("Using in-memory store; data will not survive a restart");
            (Arc::new(MemoryStore::new()), None)
        }
        DatabaseConfig::External { url, pool } => {
            let db = pool_options(pool).connect(url).await?;
            migrator().run(&db).await?;
            info!("Connected to PostgreSQL and applied migrations");
            (Arc::new(PostgresStore::new(db.clone())), Some(db))
        }
    };

    if config.seed_profiles {
        seed_profiles(store.as_ref()).await?;
    }

    Ok((store, pool))
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    // A wildcard anywhere in the list allows every origin
    let allow_origin = if config.cors.allowed_origins.iter().any(|o| matches!(o, CorsOrigin::Wildcard)) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &config.cors.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                // Url serialises origins with a trailing slash, browsers send them without one
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([http::Method::GET, http::Method::POST, http::Method::PATCH])
        .allow_headers([http::header::CONTENT_TYPE]);

    if let Some(max_age) = config.cors.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router with all endpoints and middleware.
///
/// - `/api/*`: uploads, newsletter, reviews and profiles
/// - `{uploads.public_path}/{key}`: uploaded images
/// - `/api/docs` and `/api-docs/openapi.json`: API documentation
/// - `/healthz`, and `/internal/metrics` when metrics are enabled
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let upload_limit = state.config.uploads.max_file_size.saturating_add(MULTIPART_OVERHEAD);
    let upload_limit = usize::try_from(upload_limit).unwrap_or(usize::MAX);

    let api_routes = Router::new()
        .route(
            "/upload",
            post(api::handlers::uploads::upload_image).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/newsletter", post(api::handlers::newsletter::subscribe))
        .route(
            "/reviews",
            get(api::handlers::reviews::list_reviews).post(api::handlers::reviews::create_review),
        )
        .route("/reviews/{slug}", get(api::handlers::reviews::get_review))
        .route("/profiles", get(api::handlers::profiles::list_profiles))
        .route(
            "/profiles/{slug}",
            get(api::handlers::profiles::get_profile).patch(api::handlers::profiles::update_profile),
        );

    let image_path = format!("{}/{{key}}", state.config.uploads.public_path.trim_end_matches('/'));

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route(&image_path, get(api::handlers::images::get_image))
        .nest("/api", api_routes)
        .with_state(state.clone())
        .route("/api-docs/openapi.json", get(|| async { axum::Json(ApiDoc::openapi()) }))
        .merge(Scalar::with_url("/api/docs", ApiDoc::openapi()));

    let mut router = router.layer(create_cors_layer(&state.config)?);

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Main application struct.
///
/// 1. **Create**: [`Application::new`] connects the store, image storage and mailer and builds
///    the router
/// 2. **Serve**: [`Application::serve`] binds the listener, starts the outbox worker and handles
///    requests until the shutdown future resolves
/// 3. **Shutdown**: stops the worker, then closes database connections
pub struct Application {
    router: Router,
    app_state: AppState,
    config: Config,
    pool: Option<PgPool>,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting bookbites with configuration: {:#?}", config);

        let (store, pool) = setup_store(&config).await?;
        let images: Arc<dyn ImageStore> = Arc::new(ObjectImageStore::new(&config.storage).await?);
        info!(location = ?images.location(), "Image store ready");
        let mailer: Arc<dyn Mailer> = Arc::new(EmailService::new(&config)?);

        let app_state = AppState::builder()
            .config(config.clone())
            .store(store)
            .images(images)
            .mailer(mailer)
            .build();

        let router = build_router(&app_state)?;

        Ok(Self {
            router,
            app_state,
            config,
            pool,
        })
    }

    /// Shared state handed to every handler
    pub fn state(&self) -> &AppState {
        &self.app_state
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server")
    }

    fn spawn_outbox_worker(&self, shutdown: CancellationToken) -> Option<tokio::task::JoinHandle<()>> {
        let outbox = &self.config.newsletter.outbox;
        if !outbox.enabled {
            info!("Outbox worker disabled; welcome emails will queue without being sent");
            return None;
        }

        let worker = OutboxWorker::new(self.app_state.store.clone(), self.app_state.mailer.clone(), outbox);
        Some(tokio::spawn(worker.run(outbox.poll_interval, shutdown)))
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Books&Bites API listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        let shutdown_token = CancellationToken::new();
        let worker = self.spawn_outbox_worker(shutdown_token.clone());

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Stopping outbox worker...");
        shutdown_token.cancel();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::warn!(error = %e, "Outbox worker task failed");
            }
        }

        if let Some(pool) = self.pool {
            info!("Closing database connections...");
            pool.close().await;
        }

        Ok(())
    }
}
