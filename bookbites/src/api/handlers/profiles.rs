use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};

use crate::{
    AppState,
    api::models::{
        ErrorResponse,
        profiles::{ProfileResponse, ProfileUpdate},
    },
    db::ProfileStore,
    errors::{Error, Result},
};

fn not_found(slug: &str) -> Error {
    Error::NotFound {
        resource: "Profile".to_string(),
        id: slug.to_string(),
    }
}

#[utoipa::path(
    get,
    path = "/profiles",
    tag = "profiles",
    summary = "List reviewer profiles",
    responses(
        (status = 200, description = "Profiles in display order", body = [ProfileResponse]),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_profiles(State(state): State<AppState>) -> Result<Json<Vec<ProfileResponse>>> {
    let profiles = state.store.list_profiles().await?;
    Ok(Json(profiles.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/profiles/{slug}",
    tag = "profiles",
    summary = "Get reviewer profile",
    params(("slug" = String, Path, description = "Profile slug")),
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 404, description = "Profile not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn get_profile(State(state): State<AppState>, Path(slug): Path<String>) -> Result<Json<ProfileResponse>> {
    let profile = state.store.get_profile_by_slug(&slug).await?.ok_or_else(|| not_found(&slug))?;
    Ok(Json(profile.into()))
}

#[utoipa::path(
    patch,
    path = "/profiles/{slug}",
    tag = "profiles",
    summary = "Update reviewer profile",
    description = "Update the quote, favourite book or current read. Omitted fields are left unchanged.",
    params(("slug" = String, Path, description = "Profile slug")),
    request_body = ProfileUpdate,
    responses(
        (status = 200, description = "Updated profile", body = ProfileResponse),
        (status = 400, description = "Invalid update", body = ErrorResponse),
        (status = 404, description = "Profile not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    payload: std::result::Result<Json<ProfileUpdate>, JsonRejection>,
) -> Result<Json<ProfileResponse>> {
    let Json(update) = payload.map_err(|e| Error::BadRequest {
        message: format!("Invalid profile update: {}", e.body_text()),
    })?;
    if update.is_empty() {
        return Err(Error::BadRequest {
            message: "No fields to update".to_string(),
        });
    }

    let profile = state
        .store
        .update_profile(&slug, &update.into())
        .await?
        .ok_or_else(|| not_found(&slug))?;

    tracing::info!(slug = %profile.slug, "Updated profile");
    Ok(Json(profile.into()))
}

#[cfg(test)]
mod tests {
    use crate::api::models::profiles::ProfileResponse;
    use crate::test_utils::create_test_app_with;
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    #[test_log::test(tokio::test)]
    async fn test_seeded_profiles_in_order() {
        let (server, _dir) = create_test_app_with(|config| config.seed_profiles = true).await;

        let profiles: Vec<ProfileResponse> = server.get("/api/profiles").await.json();
        let slugs: Vec<&str> = profiles.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["ivana", "laure", "sandra"]);

        let raw: Value = server.get("/api/profiles/sandra").await.json();
        assert_eq!(raw["favoriteBook"], "The Night Circus");
        assert_eq!(raw["currentReading"], "The Invisible Life of Addie LaRue");
        assert_eq!(raw["alignment"], "right");
        assert_eq!(raw["order"], 3);
    }

    #[test_log::test(tokio::test)]
    async fn test_update_profile_fields() {
        let (server, _dir) = create_test_app_with(|config| config.seed_profiles = true).await;

        let response = server
            .patch("/api/profiles/laure")
            .json(&json!({ "currentReading": "  Book Lovers  " }))
            .await;
        response.assert_status_ok();
        let profile: ProfileResponse = response.json();
        assert_eq!(profile.current_reading, "Book Lovers");
        assert_eq!(profile.favorite_book, "Little Women");

        let profile: ProfileResponse = server.get("/api/profiles/laure").await.json();
        assert_eq!(profile.current_reading, "Book Lovers");
    }

    #[test_log::test(tokio::test)]
    async fn test_update_requires_a_field() {
        let (server, _dir) = create_test_app_with(|config| config.seed_profiles = true).await;

        let response = server.patch("/api/profiles/laure").json(&json!({})).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({ "error": "No fields to update" }));
    }

    #[test_log::test(tokio::test)]
    async fn test_unknown_profile_is_404() {
        let (server, _dir) = create_test_app_with(|config| config.seed_profiles = true).await;

        let response = server.get("/api/profiles/nobody").await;
        response.assert_status(StatusCode::NOT_FOUND);
        response.assert_json(&json!({ "error": "Profile not found" }));

        let response = server.patch("/api/profiles/nobody").json(&json!({ "quote": "hi" })).await;
        response.assert_status(StatusCode::NOT_FOUND);
    }
}
