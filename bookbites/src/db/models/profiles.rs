//! Database models for reviewer profiles.

use sqlx::FromRow;

/// Database model for a reviewer profile.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub avatar: String,
    pub quote: String,
    pub favorite_book: String,
    pub current_reading: String,
    pub alignment: String,
    pub display_order: i32,
    pub bio: String,
}

/// Database request for updating a profile. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdateDBRequest {
    pub quote: Option<String>,
    pub favorite_book: Option<String>,
    pub current_reading: Option<String>,
}

/// Profiles created by `seed_profiles`.
pub fn default_profiles() -> Vec<Profile> {
    vec![
        Profile {
            id: "ivana".to_string(),
            name: "Ivana".to_string(),
            slug: "ivana".to_string(),
            avatar: "/images/ivana.png".to_string(),
            quote: "Every book is a new adventure waiting to unfold".to_string(),
            favorite_book: "Pride and Prejudice".to_string(),
            current_reading: "The Seven Husbands of Evelyn Hugo".to_string(),
            alignment: "left".to_string(),
            display_order: 1,
            bio: "Book lover and coffee enthusiast. I believe that every great story deserves to be shared.".to_string(),
        },
        Profile {
            id: "laure".to_string(),
            name: "Laure".to_string(),
            slug: "laure".to_string(),
            avatar: "/images/laure.png".to_string(),
            quote: "A cup of coffee and a good book make the perfect day".to_string(),
            favorite_book: "Little Women".to_string(),
            current_reading: "Daisy Jones & The Six".to_string(),
            alignment: "center".to_string(),
            display_order: 2,
            bio: "Romance reader and mood reader. Always searching for the next book that will make me feel all the feels."
                .to_string(),
        },
        Profile {
            id: "sandra".to_string(),
            name: "Sandra".to_string(),
            slug: "sandra".to_string(),
            avatar: "/images/sandra.png".to_string(),
            quote: "Books are portals to infinite worlds".to_string(),
            favorite_book: "The Night Circus".to_string(),
            current_reading: "The Invisible Life of Addie LaRue".to_string(),
            alignment: "right".to_string(),
            display_order: 3,
            bio: "Fantasy and magical realism lover. I read to escape, to dream, and to discover new perspectives.".to_string(),
        },
    ]
}
