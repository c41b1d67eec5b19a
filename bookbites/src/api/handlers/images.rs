use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};

use crate::{AppState, errors::Result};

/// Serve an uploaded image by storage key. Mounted under `uploads.public_path`.
#[tracing::instrument(skip(state))]
pub async fn get_image(State(state): State<AppState>, Path(key): Path<String>) -> Result<Response> {
    let image = state.images.get(&key).await?;

    Ok((
        [
            (header::CONTENT_TYPE, image.content_type),
            // Keys are never reused, so the bytes behind one never change
            (header::CACHE_CONTROL, "public, max-age=31536000, immutable".to_string()),
        ],
        image.data,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use crate::test_utils::create_test_app;
    use axum::http::StatusCode;
    use serde_json::json;

    #[test_log::test(tokio::test)]
    async fn test_missing_image_is_404() {
        let (server, _dir) = create_test_app().await;

        let response = server.get("/images/1700000000000-missing.png").await;

        response.assert_status(StatusCode::NOT_FOUND);
        response.assert_json(&json!({ "error": "Image not found" }));
    }

    #[test_log::test(tokio::test)]
    async fn test_unsafe_key_is_404() {
        let (server, _dir) = create_test_app().await;

        let response = server.get("/images/..%2Fconfig.yaml").await;

        response.assert_status(StatusCode::NOT_FOUND);
    }
}
