//! Object-store abstraction for rendered pages and uploaded images.
//!
//! The store holds one HTML object per visible post, keyed by slug, plus one
//! object per uploaded image. Page blobs are derived and disposable: always
//! written wholesale, never edited in place.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("invalid blob key `{key}`")]
    InvalidKey { key: String },
    #[error("blob store io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Key of the cached page for a post slug.
pub fn post_page_key(slug: &str) -> String {
    format!("posts/{slug}.html")
}

/// Key of an uploaded image.
pub fn image_key(storage_path: &str) -> String {
    format!("media/{storage_path}")
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, content_type: &str, bytes: Bytes) -> Result<(), BlobError>;

    async fn get(&self, key: &str) -> Result<Option<Bytes>, BlobError>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), BlobError>;
}
