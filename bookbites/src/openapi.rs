//! OpenAPI documentation for the `/api/*` endpoints, served at `/api/docs`.

use utoipa::OpenApi;

use crate::api;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Books&Bites API",
        description = "Image uploads, newsletter signups, reviews and reviewer profiles for the Books&Bites site."
    ),
    servers(
        (url = "/api", description = "Books&Bites API")
    ),
    paths(
        api::handlers::uploads::upload_image,
        api::handlers::newsletter::subscribe,
        api::handlers::reviews::list_reviews,
        api::handlers::reviews::get_review,
        api::handlers::reviews::create_review,
        api::handlers::profiles::list_profiles,
        api::handlers::profiles::get_profile,
        api::handlers::profiles::update_profile,
    ),
    components(
        schemas(
            api::models::ErrorResponse,
            api::models::MessageResponse,
            api::models::uploads::UploadResponse,
            api::models::newsletter::NewsletterSignup,
            api::models::reviews::ReviewCreate,
            api::models::reviews::ReviewResponse,
            api::models::profiles::ProfileResponse,
            api::models::profiles::ProfileUpdate,
        )
    ),
    tags(
        (name = "uploads", description = "Image uploads"),
        (name = "newsletter", description = "Newsletter subscription"),
        (name = "reviews", description = "Book reviews"),
        (name = "profiles", description = "Reviewer profiles"),
    )
)]
pub struct ApiDoc;
