//! API request and response data models.
//!
//! API models are distinct from database models so the JSON contract (camelCase field names,
//! as the frontend expects) can evolve independently of the tables.
//!
//! - [`uploads`]: Image upload responses
//! - [`newsletter`]: Newsletter signup
//! - [`reviews`]: Review creation and retrieval
//! - [`profiles`]: Reviewer profiles

pub mod newsletter;
pub mod profiles;
pub mod reviews;
pub mod uploads;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error body returned by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// Confirmation body for actions without a resource to return.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}
