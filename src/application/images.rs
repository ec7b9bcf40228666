//! Image uploads and post-image association.

use std::sync::Arc;

use bytes::Bytes;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::blobs::{BlobStore, image_key};
use crate::application::error::AppError;
use crate::application::repos::{ImagesRepo, Page, PageRequest};
use crate::domain::entities::ImageRecord;

pub struct ImageService {
    images: Arc<dyn ImagesRepo>,
    blobs: Arc<dyn BlobStore>,
}

impl ImageService {
    pub fn new(images: Arc<dyn ImagesRepo>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { images, blobs }
    }

    /// Store the upload in the blob store and record it. The payload must
    /// decode as an image; the declared content type is cross-checked
    /// against the file name when absent.
    pub async fn upload(
        &self,
        file_name: String,
        declared_type: Option<String>,
        bytes: Bytes,
    ) -> Result<ImageRecord, AppError> {
        if file_name.trim().is_empty() {
            return Err(AppError::validation("file name must not be empty"));
        }
        if imagesize::blob_size(&bytes).is_err() {
            return Err(AppError::validation("payload is not a recognized image"));
        }

        let mime_type = declared_type.unwrap_or_else(|| {
            mime_guess::from_path(&file_name)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        });

        let id = Uuid::new_v4();
        let storage_path = format!("{}-{}", id.simple(), sanitize_file_name(&file_name));

        self.blobs
            .put(&image_key(&storage_path), &mime_type, bytes.clone())
            .await?;

        let record = ImageRecord {
            id,
            file_name,
            storage_path,
            size: bytes.len() as i64,
            mime_type,
            uploaded_at: OffsetDateTime::now_utc(),
            post_id: None,
        };
        self.images.insert_image(record.clone()).await?;

        Ok(record)
    }

    pub async fn list(&self, page: PageRequest) -> Result<Page<ImageRecord>, AppError> {
        Ok(self.images.list_images(page).await?)
    }

    /// Remove the image from the relational store and the blob store
    /// together.
    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let image = self
            .images
            .find_image(id)
            .await?
            .ok_or(AppError::NotFound("image"))?;

        self.blobs.delete(&image_key(&image.storage_path)).await?;
        self.images.delete_image(id).await?;
        Ok(())
    }
}

/// Extract the deduplicated set of image URLs a post references: Markdown
/// image destinations in the content plus the feature image.
pub fn scan_image_urls(content: &str, feature_image: Option<&str>) -> Vec<String> {
    let mut urls = Vec::new();
    let mut push = |url: &str| {
        let url = url.trim();
        if !url.is_empty() && !urls.iter().any(|u| u == url) {
            urls.push(url.to_string());
        }
    };

    let mut rest = content;
    while let Some(start) = rest.find("![") {
        rest = &rest[start + 2..];
        let Some(open) = rest.find("](") else { break };
        let after = &rest[open + 2..];
        let Some(close) = after.find(')') else { break };
        // Markdown allows a title after the destination.
        let destination = after[..close]
            .split_whitespace()
            .next()
            .unwrap_or_default();
        push(destination);
        rest = &after[close + 1..];
    }

    if let Some(feature) = feature_image {
        push(feature);
    }

    urls
}

fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
                ch
            } else {
                '-'
            }
        })
        .collect();
    cleaned.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_markdown_image_destinations() {
        let content = "intro\n\n![alt](/media/a.png)\ntext ![b](/media/b.jpg \"title\")";
        let urls = scan_image_urls(content, None);
        assert_eq!(urls, vec!["/media/a.png", "/media/b.jpg"]);
    }

    #[test]
    fn deduplicates_and_appends_feature_image() {
        let content = "![x](/media/a.png) ![again](/media/a.png)";
        let urls = scan_image_urls(content, Some("/media/banner.png"));
        assert_eq!(urls, vec!["/media/a.png", "/media/banner.png"]);
    }

    #[test]
    fn ignores_links_that_are_not_images() {
        let content = "[not an image](/page) and ![ok](/media/c.gif)";
        assert_eq!(scan_image_urls(content, None), vec!["/media/c.gif"]);
    }

    #[test]
    fn sanitize_file_name_replaces_odd_characters() {
        assert_eq!(sanitize_file_name("my photo (1).png"), "my-photo--1-.png");
        assert_eq!(sanitize_file_name("../etc/passwd"), "..-etc-passwd");
    }
}
