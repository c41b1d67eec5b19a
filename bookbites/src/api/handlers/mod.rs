//! HTTP request handlers, organized by resource.
//!
//! - [`uploads`]: Image upload
//! - [`images`]: Serving stored images
//! - [`newsletter`]: Newsletter signup
//! - [`reviews`]: Review publishing and retrieval
//! - [`profiles`]: Reviewer profiles

pub mod images;
pub mod newsletter;
pub mod profiles;
pub mod reviews;
pub mod uploads;
