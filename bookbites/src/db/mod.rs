//! Database layer for data persistence and access.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (API request handlers, outbox worker)
//! └──────┬──────┘
//!        │  Arc<dyn Store>
//!        ↓
//! ┌─────────────┐      ┌──────────────┐
//! │PostgresStore│      │ MemoryStore  │
//! └──────┬──────┘      └──────────────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │ Repositories│  (db::handlers - queries)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │  PostgreSQL │
//! └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`store`]: Traits the rest of the application depends on
//! - [`postgres`]: PostgreSQL implementation built on the repositories
//! - [`memory`]: In-process implementation for development and tests
//! - [`handlers`]: Repository implementations, one per table
//! - [`models`]: Database record structures matching table schemas
//! - [`errors`]: Database-specific error types
//!
//! Repositories borrow a `PgConnection`, so callers choose whether a group of calls shares a
//! transaction:
//!
//! ```ignore
//! let mut tx = pool.begin().await?;
//! let subscriber = Subscribers::new(&mut tx).insert_if_absent("reader@example.com").await?;
//! tx.commit().await?;
//! ```

pub mod errors;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use store::{OutboxStore, ProfileStore, ReviewStore, Store, SubscriberStore};
