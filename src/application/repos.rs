//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{
    BlacklistEntry, CommentRecord, ImageRecord, LinkRecord, PostRecord, SiteStatistics,
};
use crate::domain::settings::SettingsSnapshot;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

/// Offset pagination for the public listing pages and the admin API.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 100),
        }
    }

    /// Row offset for the requested page. Computed in i64 because the page
    /// number comes straight off the query string and may be arbitrarily
    /// large; u32 arithmetic would overflow.
    pub fn offset(&self) -> i64 {
        (i64::from(self.page) - 1) * i64::from(self.per_page)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, 10)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

/// Filter for public post listings; all criteria restrict to visible posts.
#[derive(Debug, Clone, Default)]
pub struct PostQueryFilter {
    pub category: Option<String>,
    pub tag: Option<String>,
    pub search: Option<String>,
}

/// Chronologically adjacent visible posts, used for prev/next navigation.
#[derive(Debug, Clone, Default)]
pub struct PostNeighbors {
    pub prev: Option<PostRecord>,
    pub next: Option<PostRecord>,
}

impl PostNeighbors {
    pub fn iter(&self) -> impl Iterator<Item = &PostRecord> {
        self.prev.iter().chain(self.next.iter())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryCount {
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TagCount {
    pub name: String,
    pub count: u64,
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<PostRecord>, RepoError>;

    /// Whether `slug` already belongs to a post other than `exclude`.
    async fn slug_taken(&self, slug: &str, exclude: Option<Uuid>) -> Result<bool, RepoError>;

    /// Prev/next visible posts around `(published_at, id)`. Strict comparison
    /// on the timestamp; identifier ordering breaks ties.
    async fn neighbors_of(
        &self,
        published_at: OffsetDateTime,
        id: Uuid,
    ) -> Result<PostNeighbors, RepoError>;

    /// Visible posts, newest first, filtered by category/tag/search.
    async fn list_visible(
        &self,
        filter: &PostQueryFilter,
        page: PageRequest,
    ) -> Result<Page<PostRecord>, RepoError>;

    /// Every visible post, newest first. The full rebuild, the archive page,
    /// the feed and the sitemap walk this stream.
    fn stream_visible(&self) -> BoxStream<'_, Result<PostRecord, RepoError>>;

    /// All posts regardless of state, newest first (admin listing).
    async fn list_all(&self, page: PageRequest) -> Result<Page<PostRecord>, RepoError>;

    async fn category_counts(&self) -> Result<Vec<CategoryCount>, RepoError>;

    async fn tag_counts(&self) -> Result<Vec<TagCount>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub published_at: OffsetDateTime,
    pub is_published: bool,
    pub is_draft: bool,
    pub is_pinned: bool,
    pub feature_image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpdatePostParams {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub published_at: OffsetDateTime,
    pub is_published: bool,
    pub is_draft: bool,
    pub is_pinned: bool,
    pub feature_image: Option<String>,
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError>;

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError>;

    /// Deletes the post row; comments cascade in the store.
    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError>;
}

#[derive(Debug, Clone)]
pub struct NewCommentParams {
    pub post_id: Uuid,
    pub author: String,
    pub email: Option<String>,
    pub content: String,
    pub ip: String,
    pub created_at: OffsetDateTime,
    pub parent_id: Option<Uuid>,
    pub reply_to: Option<String>,
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    async fn insert_comment(&self, params: NewCommentParams) -> Result<CommentRecord, RepoError>;

    async fn find_comment(&self, id: Uuid) -> Result<Option<CommentRecord>, RepoError>;

    /// Approved comments for a post, oldest first.
    async fn list_approved_for_post(
        &self,
        post_id: Uuid,
    ) -> Result<Vec<CommentRecord>, RepoError>;

    /// All comments newest first, optionally only (un)approved ones.
    async fn list_comments(
        &self,
        approved: Option<bool>,
        page: PageRequest,
    ) -> Result<Page<CommentRecord>, RepoError>;

    /// Comments submitted from `ip` at or after `since`.
    async fn count_from_ip_since(
        &self,
        ip: &str,
        since: OffsetDateTime,
    ) -> Result<u64, RepoError>;

    async fn set_approved(&self, id: Uuid, approved: bool) -> Result<CommentRecord, RepoError>;

    async fn delete_comment(&self, id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait ImagesRepo: Send + Sync {
    async fn insert_image(&self, record: ImageRecord) -> Result<(), RepoError>;

    async fn find_image(&self, id: Uuid) -> Result<Option<ImageRecord>, RepoError>;

    async fn list_images(&self, page: PageRequest) -> Result<Page<ImageRecord>, RepoError>;

    async fn delete_image(&self, id: Uuid) -> Result<(), RepoError>;

    /// Replace the post's association rows wholesale with `urls` and point
    /// the owning-post link of matching uploads at the post.
    async fn replace_post_images(
        &self,
        post_id: Uuid,
        urls: &[String],
        storage_paths: &[String],
    ) -> Result<(), RepoError>;
}

#[derive(Debug, Clone)]
pub struct UpsertLinkParams {
    pub name: String,
    pub url: String,
    pub description: Option<String>,
    pub sort_order: i32,
}

#[async_trait]
pub trait LinksRepo: Send + Sync {
    async fn list_links(&self) -> Result<Vec<LinkRecord>, RepoError>;

    async fn insert_link(&self, params: UpsertLinkParams) -> Result<LinkRecord, RepoError>;

    async fn update_link(&self, id: Uuid, params: UpsertLinkParams)
        -> Result<LinkRecord, RepoError>;

    async fn delete_link(&self, id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait SettingsRepo: Send + Sync {
    async fn load_settings(&self) -> Result<SettingsSnapshot, RepoError>;

    async fn upsert_settings(&self, entries: &[(String, String)]) -> Result<(), RepoError>;
}

#[async_trait]
pub trait BlacklistRepo: Send + Sync {
    async fn list_entries(&self) -> Result<Vec<BlacklistEntry>, RepoError>;

    async fn insert_entry(
        &self,
        ip_pattern: String,
        reason: Option<String>,
        expires_at: Option<OffsetDateTime>,
    ) -> Result<BlacklistEntry, RepoError>;

    async fn delete_entry(&self, id: Uuid) -> Result<(), RepoError>;

    /// Whether any live entry matches `ip` at `now`.
    async fn is_blacklisted(&self, ip: &str, now: OffsetDateTime) -> Result<bool, RepoError>;
}

#[async_trait]
pub trait StatsRepo: Send + Sync {
    /// Record one page view: appends to the log and bumps the counter.
    async fn record_view(
        &self,
        post_id: Uuid,
        ip: &str,
        viewed_at: OffsetDateTime,
    ) -> Result<(), RepoError>;

    async fn statistics(&self) -> Result<SiteStatistics, RepoError>;
}

#[cfg(test)]
mod tests {
    use super::PageRequest;

    #[test]
    fn page_request_clamps_and_pages() {
        let page = PageRequest::new(0, 0);
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, 1);
        assert_eq!(page.offset(), 0);

        let page = PageRequest::new(3, 10);
        assert_eq!(page.offset(), 20);
    }

    #[test]
    fn huge_page_numbers_do_not_overflow_the_offset() {
        let page = PageRequest::new(u32::MAX, 100);
        assert_eq!(page.offset(), (i64::from(u32::MAX) - 1) * 100);
    }
}
