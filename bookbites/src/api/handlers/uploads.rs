use axum::{
    Json,
    extract::{
        Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
};
use bytes::BytesMut;
use metrics::counter;

use crate::{
    AppState,
    api::models::{ErrorResponse, uploads::UploadResponse},
    errors::{Error, Result},
    storage::resolve_content_type,
};

/// Multipart field carrying the image.
pub const IMAGE_FIELD: &str = "image";

fn no_file() -> Error {
    Error::BadRequest {
        message: "No file".to_string(),
    }
}

fn too_large() -> Error {
    Error::BadRequest {
        message: "File too large".to_string(),
    }
}

/// A multipart stream error; tripping the request body limit counts as an oversized file.
fn stream_error(e: MultipartError) -> Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        too_large()
    } else {
        tracing::debug!(error = %e, "Malformed multipart upload");
        no_file()
    }
}

#[utoipa::path(
    post,
    path = "/upload",
    tag = "uploads",
    summary = "Upload image",
    description = "Store an image sent as the `image` field of a multipart form. Local storage returns the stored filename, object storage returns a URL.",
    request_body(content_type = "multipart/form-data", description = "Form with an `image` file field"),
    responses(
        (status = 200, description = "Image stored", body = UploadResponse),
        (status = 400, description = "No file, or file too large", body = ErrorResponse),
        (status = 500, description = "Upload failed", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn upload_image(State(state): State<AppState>, multipart: std::result::Result<Multipart, MultipartRejection>) -> Result<Json<UploadResponse>> {
    let mut multipart = multipart.map_err(|e| {
        tracing::debug!(error = %e, "Upload is not a multipart form");
        no_file()
    })?;
    let max_file_size = state.config.uploads.max_file_size;

    while let Some(mut field) = multipart.next_field().await.map_err(stream_error)? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = resolve_content_type(field.content_type(), &filename);

        // Check size limit incrementally so oversized uploads never reach the store
        let mut data = BytesMut::new();
        while let Some(chunk) = field.chunk().await.map_err(stream_error)? {
            if (data.len() + chunk.len()) as u64 > max_file_size {
                tracing::warn!(
                    filename = %filename,
                    received = data.len() + chunk.len(),
                    max_file_size = max_file_size,
                    "File size limit exceeded, aborting upload"
                );
                counter!("bookbites_uploads_total", "outcome" => "too_large").increment(1);
                return Err(too_large());
            }
            data.extend_from_slice(&chunk);
        }

        // Browsers send an empty, unnamed part when no file was picked
        if filename.is_empty() && data.is_empty() {
            break;
        }

        let asset = state.images.put(&filename, &content_type, data.freeze()).await.map_err(|e| {
            counter!("bookbites_uploads_total", "outcome" => "error").increment(1);
            Error::unavailable("Upload failed", e)
        })?;

        tracing::info!(
            key = %asset.key,
            size = asset.size,
            content_type = %asset.content_type,
            location = ?asset.location,
            "Stored uploaded image"
        );
        counter!("bookbites_uploads_total", "outcome" => "success").increment(1);

        return Ok(Json(asset.into()));
    }

    Err(no_file())
}
