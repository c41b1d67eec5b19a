use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::{
        ErrorResponse,
        reviews::{ReviewCreate, ReviewResponse},
    },
    db::{ReviewStore, errors::DbError, models::reviews::ReviewCreateDBRequest},
    errors::{Error, Result},
    types::slugify,
};

fn bad_request(message: &str) -> Error {
    Error::BadRequest {
        message: message.to_string(),
    }
}

impl TryFrom<ReviewCreate> for ReviewCreateDBRequest {
    type Error = Error;

    fn try_from(request: ReviewCreate) -> Result<Self> {
        let title = request.title.trim().to_string();
        let title_slug = slugify(&title);
        if title_slug.is_empty() {
            return Err(bad_request("Title is required"));
        }
        if !(1..=5).contains(&request.rating) {
            return Err(bad_request("Rating must be between 1 and 5"));
        }
        let author = request.author.trim().to_string();
        if author.is_empty() {
            return Err(bad_request("Author is required"));
        }
        let image_url = request.image_url.trim().to_string();
        if image_url.is_empty() {
            return Err(bad_request("Image is required"));
        }

        Ok(Self {
            title,
            title_slug,
            rating: request.rating,
            review: request.review,
            categories: request.categories.trim().to_string(),
            meal: request.meal.trim().to_string(),
            author,
            image_url,
        })
    }
}

#[utoipa::path(
    get,
    path = "/reviews",
    tag = "reviews",
    summary = "List reviews",
    description = "All reviews, newest first.",
    responses(
        (status = 200, description = "Reviews", body = [ReviewResponse]),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_reviews(State(state): State<AppState>) -> Result<Json<Vec<ReviewResponse>>> {
    let reviews = state.store.list_reviews().await?;
    Ok(Json(reviews.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/reviews/{slug}",
    tag = "reviews",
    summary = "Get review",
    params(("slug" = String, Path, description = "Title slug")),
    responses(
        (status = 200, description = "Review", body = ReviewResponse),
        (status = 404, description = "Review not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn get_review(State(state): State<AppState>, Path(slug): Path<String>) -> Result<Json<ReviewResponse>> {
    let review = state.store.get_review_by_slug(&slug).await?.ok_or_else(|| Error::NotFound {
        resource: "Review".to_string(),
        id: slug.clone(),
    })?;

    Ok(Json(review.into()))
}

#[utoipa::path(
    post,
    path = "/reviews",
    tag = "reviews",
    summary = "Publish review",
    description = "Create a review. The title slug must be unique.",
    request_body = ReviewCreate,
    responses(
        (status = 201, description = "Review created", body = ReviewResponse),
        (status = 400, description = "Invalid review", body = ErrorResponse),
        (status = 409, description = "A review with this title already exists", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_review(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ReviewCreate>, JsonRejection>,
) -> Result<(StatusCode, Json<ReviewResponse>)> {
    let Json(request) = payload.map_err(|e| Error::BadRequest {
        message: format!("Invalid review: {}", e.body_text()),
    })?;
    let request = ReviewCreateDBRequest::try_from(request)?;

    let review = state.store.create_review(&request).await.map_err(|e| match e {
        DbError::UniqueViolation { .. } => Error::Conflict {
            message: "A review with this title already exists".to_string(),
        },
        other => other.into(),
    })?;

    tracing::info!(slug = %review.title_slug, author = %review.author, "Published review");
    Ok((StatusCode::CREATED, Json(review.into())))
}
