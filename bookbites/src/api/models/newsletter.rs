//! API request models for newsletter signup.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"));

/// Request to subscribe an address to the newsletter.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewsletterSignup {
    pub email: String,
}

/// Read a signup out of a raw JSON body. Only an object with a string `email` qualifies; derived
/// `Deserialize` would also take `["addr"]` as a one-field struct.
impl TryFrom<Value> for NewsletterSignup {
    type Error = &'static str;

    fn try_from(body: Value) -> Result<Self, Self::Error> {
        match body {
            Value::Object(mut fields) => match fields.remove("email") {
                Some(Value::String(email)) => Ok(Self { email }),
                Some(_) => Err("email is not a string"),
                None => Err("email is missing"),
            },
            _ => Err("body is not a JSON object"),
        }
    }
}

/// Trim and lowercase an address, returning it only if it looks like an email.
pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    EMAIL_PATTERN.is_match(&email).then_some(email)
}
