//! API request and response models for reviewer profiles.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::models::profiles::{Profile, ProfileUpdateDBRequest};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub avatar: String,
    pub quote: String,
    pub favorite_book: String,
    pub current_reading: String,
    /// `left`, `center` or `right`
    pub alignment: String,
    /// Position on the about page
    pub order: i32,
    pub bio: String,
}

impl From<Profile> for ProfileResponse {
    fn from(profile: Profile) -> Self {
        Self {
            id: profile.id,
            name: profile.name,
            slug: profile.slug,
            avatar: profile.avatar,
            quote: profile.quote,
            favorite_book: profile.favorite_book,
            current_reading: profile.current_reading,
            alignment: profile.alignment,
            order: profile.display_order,
            bio: profile.bio,
        }
    }
}

/// Editable profile fields. Omitted fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default)]
    pub quote: Option<String>,
    #[serde(default)]
    pub favorite_book: Option<String>,
    #[serde(default)]
    pub current_reading: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.quote.is_none() && self.favorite_book.is_none() && self.current_reading.is_none()
    }
}

impl From<ProfileUpdate> for ProfileUpdateDBRequest {
    fn from(update: ProfileUpdate) -> Self {
        let trim = |value: Option<String>| value.map(|v| v.trim().to_string());
        Self {
            quote: trim(update.quote),
            favorite_book: trim(update.favorite_book),
            current_reading: trim(update.current_reading),
        }
    }
}
