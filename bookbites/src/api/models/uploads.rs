//! API response models for image uploads.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::{ImageRef, UploadedAsset};

/// Where the uploaded image can be found.
///
/// Local and in-memory stores return the storage key, served under the public image path.
/// Object storage returns a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum UploadResponse {
    Filename {
        /// Storage key, e.g. `1700000000000-cover.png`
        filename: String,
    },
    Url {
        /// Signed or public URL of the stored object
        url: String,
    },
}

impl From<UploadedAsset> for UploadResponse {
    fn from(asset: UploadedAsset) -> Self {
        match asset.reference {
            ImageRef::Filename(filename) => UploadResponse::Filename { filename },
            ImageRef::Url(url) => UploadResponse::Url { url: url.to_string() },
        }
    }
}
