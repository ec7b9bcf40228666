//! Post write orchestration.
//!
//! Persists the authoritative record first, then publishes the regeneration
//! plan for the cached pages. Neighbor sets that the plan depends on are
//! captured at the moments the cascade rules require: for updates, both
//! before and after the write.

use std::sync::Arc;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::images::scan_image_urls;
use crate::application::regen::{RegenPlan, RegenQueue};
use crate::application::repos::{
    CreatePostParams, ImagesRepo, Page, PageRequest, PostsRepo, PostsWriteRepo, UpdatePostParams,
};
use crate::domain::entities::PostRecord;
use crate::domain::slug::generate_unique_slug_async;

#[derive(Debug, Clone, Default)]
pub struct CreatePostCommand {
    pub title: String,
    pub content: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub published_at: Option<OffsetDateTime>,
    pub is_published: Option<bool>,
    pub is_draft: Option<bool>,
    pub is_pinned: Option<bool>,
    pub feature_image: Option<String>,
}

/// Partial update; absent fields keep their stored values. Supplying an
/// empty string for `category` or `feature_image` clears the field (a
/// cleared feature image falls back to the site banner at render time).
#[derive(Debug, Clone, Default)]
pub struct UpdatePostCommand {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub published_at: Option<OffsetDateTime>,
    pub is_published: Option<bool>,
    pub is_draft: Option<bool>,
    pub is_pinned: Option<bool>,
    pub feature_image: Option<String>,
}

pub struct PostService {
    posts: Arc<dyn PostsRepo>,
    posts_write: Arc<dyn PostsWriteRepo>,
    images: Arc<dyn ImagesRepo>,
    queue: Arc<RegenQueue>,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        posts_write: Arc<dyn PostsWriteRepo>,
        images: Arc<dyn ImagesRepo>,
        queue: Arc<RegenQueue>,
    ) -> Self {
        Self {
            posts,
            posts_write,
            images,
            queue,
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<PostRecord, AppError> {
        self.posts
            .find_by_id(id)
            .await?
            .ok_or(AppError::NotFound("post"))
    }

    pub async fn list(&self, page: PageRequest) -> Result<Page<PostRecord>, AppError> {
        Ok(self.posts.list_all(page).await?)
    }

    pub async fn create(&self, command: CreatePostCommand) -> Result<PostRecord, AppError> {
        let title = command.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::validation("title must not be empty"));
        }

        let slug = generate_unique_slug_async(&title, |candidate| {
            let posts = self.posts.clone();
            let candidate = candidate.to_string();
            async move { posts.slug_taken(&candidate, None).await }
        })
        .await
        .map_err(|err| AppError::unexpected(err.to_string()))?;

        let params = CreatePostParams {
            title,
            slug,
            content: command.content,
            category: normalize_optional(command.category),
            tags: dedup_tags(command.tags),
            published_at: command.published_at.unwrap_or_else(OffsetDateTime::now_utc),
            is_published: command.is_published.unwrap_or(true),
            is_draft: command.is_draft.unwrap_or(false),
            is_pinned: command.is_pinned.unwrap_or(false),
            feature_image: normalize_optional(command.feature_image),
        };

        let post = self.posts_write.create_post(params).await?;
        self.reassociate_images(&post).await?;

        if post.is_visible() {
            let neighbors = self.posts.neighbors_of(post.published_at, post.id).await?;
            self.queue
                .publish_plan(RegenPlan::for_create(&post, &neighbors));
        }

        Ok(post)
    }

    pub async fn update(
        &self,
        id: Uuid,
        command: UpdatePostCommand,
    ) -> Result<PostRecord, AppError> {
        let current = self
            .posts
            .find_by_id(id)
            .await?
            .ok_or(AppError::NotFound("post"))?;

        // Old neighbors must be captured before the write; a timestamp change
        // relocates the post and the "old" side would be unrecoverable after.
        let before = self
            .posts
            .neighbors_of(current.published_at, current.id)
            .await?;

        let title = match command.title {
            Some(title) => {
                let title = title.trim().to_string();
                if title.is_empty() {
                    return Err(AppError::validation("title must not be empty"));
                }
                title
            }
            None => current.title.clone(),
        };

        // The slug moves only when the title actually changed.
        let slug = if title != current.title {
            generate_unique_slug_async(&title, |candidate| {
                let posts = self.posts.clone();
                let candidate = candidate.to_string();
                let exclude = current.id;
                async move { posts.slug_taken(&candidate, Some(exclude)).await }
            })
            .await
            .map_err(|err| AppError::unexpected(err.to_string()))?
        } else {
            current.slug.clone()
        };

        let slug_changed = slug != current.slug;

        let params = UpdatePostParams {
            id,
            title,
            slug,
            content: command.content.unwrap_or_else(|| current.content.clone()),
            category: match command.category {
                Some(value) => normalize_optional(Some(value)),
                None => current.category.clone(),
            },
            tags: match command.tags {
                Some(tags) => dedup_tags(tags),
                None => current.tags.clone(),
            },
            published_at: command.published_at.unwrap_or(current.published_at),
            is_published: command.is_published.unwrap_or(current.is_published),
            is_draft: command.is_draft.unwrap_or(current.is_draft),
            is_pinned: command.is_pinned.unwrap_or(current.is_pinned),
            feature_image: match command.feature_image {
                Some(value) => normalize_optional(Some(value)),
                None => current.feature_image.clone(),
            },
        };

        let updated = self.posts_write.update_post(params).await?;
        self.reassociate_images(&updated).await?;

        let after = self
            .posts
            .neighbors_of(updated.published_at, updated.id)
            .await?;

        let mut plan = RegenPlan::for_update(&updated, &before, &after);
        // A renamed post leaves its old page behind under the old slug.
        if slug_changed {
            plan.delete_blob = Some(current.slug.clone());
        }
        self.queue.publish_plan(plan);

        Ok(updated)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let current = self
            .posts
            .find_by_id(id)
            .await?
            .ok_or(AppError::NotFound("post"))?;

        let neighbors = self
            .posts
            .neighbors_of(current.published_at, current.id)
            .await?;

        self.posts_write.delete_post(id).await?;
        self.queue
            .publish_plan(RegenPlan::for_delete(&current, &neighbors));

        Ok(())
    }

    /// Full recomputation used to recover from drift, e.g. after a template
    /// change or a batch category rename that the cascade does not propagate.
    pub fn rebuild_all(&self) {
        self.queue
            .publish(crate::application::regen::RegenTask::RebuildAll);
    }

    /// Image associations are recomputed, not incrementally maintained: the
    /// association rows are replaced wholesale with the deduplicated set of
    /// URLs referenced by the content and the feature image.
    async fn reassociate_images(&self, post: &PostRecord) -> Result<(), AppError> {
        let urls = scan_image_urls(&post.content, post.feature_image.as_deref());
        let storage_paths: Vec<String> = urls
            .iter()
            .filter_map(|url| url.strip_prefix("/media/"))
            .map(str::to_string)
            .collect();
        self.images
            .replace_post_images(post.id, &urls, &storage_paths)
            .await?;
        Ok(())
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim().to_string();
        if trimmed.is_empty() { None } else { Some(trimmed) }
    })
}

fn dedup_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = Vec::new();
    for tag in tags {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !seen.contains(&tag) {
            seen.push(tag);
        }
    }
    seen
}
