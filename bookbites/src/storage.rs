//! Image storage backends (local directory, S3-compatible bucket, memory).
//!
//! Every backend is an [`object_store::ObjectStore`]; what differs is how a stored object is
//! referenced afterwards. Local and memory stores hand back the storage key, which the server
//! itself serves under `uploads.public_path`. S3 hands back a URL: a public one when
//! `public_url_base` is configured, otherwise a signed GET URL.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::Method;
use bytes::Bytes;
use chrono::Utc;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::config::StorageConfig;

/// Errors raised by the image store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No object stored under this key
    #[error("image not found: {key}")]
    NotFound { key: String },

    /// Key contains characters the store never generates
    #[error("invalid image key: {key}")]
    InvalidKey { key: String },

    /// Backend could not be constructed from the configuration
    #[error("invalid storage configuration: {0}")]
    InvalidConfig(String),

    /// Object storage error
    #[error("object storage error: {0}")]
    ObjectStore(#[from] object_store::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Which kind of backend holds an uploaded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageLocation {
    LocalDisk,
    ObjectStorage,
    Memory,
}

/// How a client refers to an image after upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    /// Storage key; served by this server under the public image path
    Filename(String),
    /// Absolute URL readable without going through this server
    Url(Url),
}

/// An image that has been written to the store.
#[derive(Debug, Clone)]
pub struct UploadedAsset {
    pub original_filename: String,
    pub key: String,
    pub content_type: String,
    pub size: u64,
    pub location: StorageLocation,
    pub reference: ImageRef,
}

/// Image bytes read back from the store.
#[derive(Debug, Clone)]
pub struct StoredImage {
    pub content_type: String,
    pub data: Bytes,
}

/// Trait for image storage backends
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Which kind of backend this is
    fn location(&self) -> StorageLocation;

    /// Write an image under a fresh key derived from the original filename
    async fn put(&self, original_filename: &str, content_type: &str, data: Bytes) -> Result<UploadedAsset>;

    /// Read an image back by key
    async fn get(&self, key: &str) -> Result<StoredImage>;
}

/// How stored objects are referenced once written.
enum Addressing {
    /// Return the key; the server serves it
    Key,
    /// Return `{base}/{key}`
    PublicUrl(Url),
    /// Return a presigned GET URL valid for `ttl`
    Signed { signer: Arc<AmazonS3>, ttl: Duration },
}

/// [`ImageStore`] over any `object_store` backend.
pub struct ObjectImageStore {
    inner: Arc<dyn ObjectStore>,
    location: StorageLocation,
    addressing: Addressing,
}

impl ObjectImageStore {
    /// Create a new image store from configuration.
    pub async fn new(config: &StorageConfig) -> Result<Self> {
        match config {
            StorageConfig::Memory => Ok(Self::memory()),

            StorageConfig::Local { path } => Self::local(path.clone()).await,

            StorageConfig::S3 {
                bucket,
                region,
                endpoint,
                access_key,
                secret_key,
                signed_url_ttl,
                public_url_base,
            } => {
                // Anything not configured explicitly comes from the usual AWS_* variables
                let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
                if let Some(region) = region {
                    builder = builder.with_region(region);
                }
                if let Some(endpoint) = endpoint {
                    builder = builder.with_endpoint(endpoint).with_allow_http(endpoint.starts_with("http://"));
                }
                if let Some(access_key) = access_key {
                    builder = builder.with_access_key_id(access_key);
                }
                if let Some(secret_key) = secret_key {
                    builder = builder.with_secret_access_key(secret_key);
                }

                let s3 = Arc::new(builder.build().map_err(|e| StorageError::InvalidConfig(e.to_string()))?);

                let addressing = match public_url_base {
                    Some(base) => Addressing::PublicUrl(base.clone()),
                    None => Addressing::Signed {
                        signer: s3.clone(),
                        ttl: *signed_url_ttl,
                    },
                };

                Ok(Self {
                    inner: s3,
                    location: StorageLocation::ObjectStorage,
                    addressing,
                })
            }
        }
    }

    /// Local directory store. The directory is created if it does not exist.
    pub async fn local(path: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(&path).await?;
        let fs = LocalFileSystem::new_with_prefix(&path).map_err(|e| StorageError::InvalidConfig(e.to_string()))?;
        Ok(Self {
            inner: Arc::new(fs),
            location: StorageLocation::LocalDisk,
            addressing: Addressing::Key,
        })
    }

    /// In-process store.
    pub fn memory() -> Self {
        Self {
            inner: Arc::new(InMemory::new()),
            location: StorageLocation::Memory,
            addressing: Addressing::Key,
        }
    }

    /// In-process store that answers with public URLs, standing in for a public bucket.
    #[cfg(test)]
    pub(crate) fn memory_with_public_url(base: Url) -> Self {
        Self {
            inner: Arc::new(InMemory::new()),
            location: StorageLocation::ObjectStorage,
            addressing: Addressing::PublicUrl(base),
        }
    }

    /// Number of stored objects. Keys are flat, so one delimited listing sees them all.
    #[cfg(test)]
    pub(crate) async fn object_count(&self) -> Result<usize> {
        Ok(self.inner.list_with_delimiter(None).await?.objects.len())
    }

    async fn reference_for(&self, key: &str, path: &ObjectPath) -> Result<ImageRef> {
        match &self.addressing {
            Addressing::Key => Ok(ImageRef::Filename(key.to_string())),
            Addressing::PublicUrl(base) => Ok(ImageRef::Url(public_url(base, key)?)),
            Addressing::Signed { signer, ttl } => Ok(ImageRef::Url(signer.signed_url(Method::GET, path, *ttl).await?)),
        }
    }
}

#[async_trait]
impl ImageStore for ObjectImageStore {
    fn location(&self) -> StorageLocation {
        self.location
    }

    #[instrument(skip(self, data), fields(size = data.len()), err)]
    async fn put(&self, original_filename: &str, content_type: &str, data: Bytes) -> Result<UploadedAsset> {
        let key = storage_key(Utc::now().timestamp_millis(), original_filename);
        let path = ObjectPath::from(key.as_str());
        let size = data.len() as u64;

        // LocalFileSystem has nowhere to keep attributes and rejects them
        let mut opts = PutOptions::default();
        if self.location != StorageLocation::LocalDisk {
            let mut attributes = Attributes::new();
            attributes.insert(Attribute::ContentType, content_type.to_string().into());
            opts.attributes = attributes;
        }

        self.inner.put_opts(&path, PutPayload::from(data), opts).await?;
        debug!(key = %key, "Stored image");

        let reference = self.reference_for(&key, &path).await?;

        Ok(UploadedAsset {
            original_filename: original_filename.to_string(),
            key,
            content_type: content_type.to_string(),
            size,
            location: self.location,
            reference,
        })
    }

    #[instrument(skip(self), err)]
    async fn get(&self, key: &str) -> Result<StoredImage> {
        if !is_valid_key(key) {
            return Err(StorageError::InvalidKey { key: key.to_string() });
        }

        let path = ObjectPath::from(key);
        let result = match self.inner.get(&path).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => return Err(StorageError::NotFound { key: key.to_string() }),
            Err(e) => return Err(e.into()),
        };

        let stored_type = result.attributes.get(&Attribute::ContentType).map(|v| v.to_string());
        let data = result.bytes().await?;

        Ok(StoredImage {
            content_type: stored_type.unwrap_or_else(|| guess_content_type(key)),
            data,
        })
    }
}

/// Build the storage key for an upload: `{epoch-millis}-{sanitized filename}`.
pub fn storage_key(timestamp_millis: i64, original_filename: &str) -> String {
    format!("{timestamp_millis}-{}", sanitize_filename(original_filename))
}

/// Reduce a client-supplied filename to a safe single path segment.
///
/// Directory components are dropped, whitespace becomes `-`, anything outside
/// `[A-Za-z0-9._-]` becomes `_`. Leading dots are stripped so the result is never hidden or a
/// relative path component.
pub fn sanitize_filename(original: &str) -> String {
    let base = original.rsplit(['/', '\\']).next().unwrap_or_default();

    let cleaned: String = base
        .trim()
        .chars()
        .map(|c| match c {
            c if c.is_whitespace() => '-',
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '_' | '-' => c,
            _ => '_',
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() { "upload".to_string() } else { cleaned.to_string() }
}

/// Whether `key` could have been produced by [`storage_key`].
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('.')
        && key.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Content type for an upload: the declared one, else a guess from the filename.
pub fn resolve_content_type(declared: Option<&str>, filename: &str) -> String {
    match declared.map(str::trim) {
        Some(declared) if !declared.is_empty() => declared.to_string(),
        _ => guess_content_type(filename),
    }
}

fn guess_content_type(filename: &str) -> String {
    mime_guess::from_path(filename).first_or_octet_stream().essence_str().to_string()
}

fn public_url(base: &Url, key: &str) -> Result<Url> {
    let joined = format!("{}/{}", base.as_str().trim_end_matches('/'), key);
    Url::parse(&joined).map_err(|e| StorageError::InvalidConfig(format!("public_url_base: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("cover.png"), "cover.png");
        assert_eq!(sanitize_filename("my cover photo.jpg"), "my-cover-photo.jpg");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\ivana\\tarte.jpeg"), "tarte.jpeg");
        assert_eq!(sanitize_filename("crème brûlée.png"), "cr_me-br_l_e.png");
        assert_eq!(sanitize_filename(".hidden"), "hidden");
        assert_eq!(sanitize_filename(""), "upload");
        assert_eq!(sanitize_filename("dir/"), "upload");
    }

    #[test]
    fn test_storage_key_format() {
        assert_eq!(storage_key(1700000000000, "The Night Circus.jpg"), "1700000000000-The-Night-Circus.jpg");
        assert!(is_valid_key(&storage_key(1, "../x y.png")));
    }

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("1700000000000-cover.png"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("..%2Fsecret"));
        assert!(!is_valid_key("a/b"));
        assert!(!is_valid_key(".env"));
    }

    #[test]
    fn test_resolve_content_type() {
        assert_eq!(resolve_content_type(Some("image/webp"), "x.png"), "image/webp");
        assert_eq!(resolve_content_type(None, "cover.png"), "image/png");
        assert_eq!(resolve_content_type(Some(""), "cover.jpg"), "image/jpeg");
        assert_eq!(resolve_content_type(None, "blob"), "application/octet-stream");
    }

    #[test]
    fn test_public_url_joins_key() {
        let base = Url::parse("https://cdn.example.com/images/").unwrap();
        assert_eq!(public_url(&base, "1-a.png").unwrap().as_str(), "https://cdn.example.com/images/1-a.png");
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = ObjectImageStore::memory();
        let asset = store.put("cover.png", "image/png", Bytes::from_static(b"png-bytes")).await.unwrap();

        assert_eq!(asset.location, StorageLocation::Memory);
        assert_eq!(asset.size, 9);
        assert!(asset.key.ends_with("-cover.png"));
        assert_eq!(asset.reference, ImageRef::Filename(asset.key.clone()));

        let stored = store.get(&asset.key).await.unwrap();
        assert_eq!(stored.data, Bytes::from_static(b"png-bytes"));
        assert_eq!(stored.content_type, "image/png");
    }

    #[tokio::test]
    async fn test_local_store_writes_into_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("public").join("images");
        let store = ObjectImageStore::local(root.clone()).await.unwrap();

        let asset = store.put("tarte tatin.jpg", "image/jpeg", Bytes::from_static(b"jpeg")).await.unwrap();

        assert_eq!(asset.location, StorageLocation::LocalDisk);
        assert!(root.join(&asset.key).exists());

        let stored = store.get(&asset.key).await.unwrap();
        assert_eq!(stored.data, Bytes::from_static(b"jpeg"));
        assert_eq!(stored.content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn test_public_url_addressing_returns_url() {
        let store = ObjectImageStore::memory_with_public_url(Url::parse("https://cdn.example.com/images/").unwrap());

        let asset = store.put("cover.png", "image/png", Bytes::from_static(b"png")).await.unwrap();

        assert_eq!(asset.location, StorageLocation::ObjectStorage);
        let expected = Url::parse(&format!("https://cdn.example.com/images/{}", asset.key)).unwrap();
        assert_eq!(asset.reference, ImageRef::Url(expected));
        assert_eq!(store.object_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_signed_addressing_returns_presigned_url() {
        let signer = AmazonS3Builder::new()
            .with_bucket_name("bookbites-images")
            .with_region("eu-west-1")
            .with_access_key_id("test-access-key")
            .with_secret_access_key("test-secret-key")
            .build()
            .unwrap();
        // Bytes go to memory; only URL signing touches the S3 client, and that needs no network
        let store = ObjectImageStore {
            inner: Arc::new(InMemory::new()),
            location: StorageLocation::ObjectStorage,
            addressing: Addressing::Signed {
                signer: Arc::new(signer),
                ttl: Duration::from_secs(3600),
            },
        };

        let asset = store.put("tarte tatin.jpg", "image/jpeg", Bytes::from_static(b"jpeg")).await.unwrap();

        let ImageRef::Url(url) = &asset.reference else {
            panic!("expected a URL, got {:?}", asset.reference);
        };
        assert!(url.path().ends_with(&asset.key), "{url}");
        let query = url.query().unwrap_or_default();
        assert!(query.contains("X-Amz-Expires=3600"), "{url}");
        assert!(query.contains("X-Amz-Signature="), "{url}");
    }

    #[tokio::test]
    async fn test_get_missing_and_invalid_keys() {
        let store = ObjectImageStore::memory();
        assert!(matches!(store.get("123-missing.png").await, Err(StorageError::NotFound { .. })));
        assert!(matches!(store.get("../secret").await, Err(StorageError::InvalidKey { .. })));
    }
}
