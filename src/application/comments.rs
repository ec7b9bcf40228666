//! Comment submission and moderation.
//!
//! Submission checks run in a fixed order: blacklist first, then field
//! validation, parent resolution, and the rolling-window rate limit. The
//! rate limit is a count-then-insert over stored comments with no
//! transactional guard; enforcement is eventual, not exact, and that is
//! accepted.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::regen::{RegenPlan, RegenQueue};
use crate::application::repos::{
    BlacklistRepo, CommentsRepo, NewCommentParams, Page, PageRequest, PostsRepo,
};
use crate::domain::entities::CommentRecord;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    pub window: Duration,
    pub max_comments: u64,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            max_comments: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubmitCommentCommand {
    pub post_slug: String,
    pub author: String,
    pub email: Option<String>,
    pub content: String,
    pub ip: String,
    pub parent_id: Option<Uuid>,
}

pub struct CommentService {
    comments: Arc<dyn CommentsRepo>,
    posts: Arc<dyn PostsRepo>,
    blacklist: Arc<dyn BlacklistRepo>,
    queue: Arc<RegenQueue>,
    rate_limit: RateLimitPolicy,
}

impl CommentService {
    pub fn new(
        comments: Arc<dyn CommentsRepo>,
        posts: Arc<dyn PostsRepo>,
        blacklist: Arc<dyn BlacklistRepo>,
        queue: Arc<RegenQueue>,
        rate_limit: RateLimitPolicy,
    ) -> Self {
        Self {
            comments,
            posts,
            blacklist,
            queue,
            rate_limit,
        }
    }

    pub async fn submit(&self, command: SubmitCommentCommand) -> Result<CommentRecord, AppError> {
        let now = OffsetDateTime::now_utc();

        // Blacklisted sources are rejected before any other validation.
        if self.blacklist.is_blacklisted(&command.ip, now).await? {
            return Err(AppError::Forbidden("submissions from this address are not accepted".into()));
        }

        let author = command.author.trim().to_string();
        if author.is_empty() {
            return Err(AppError::validation("author must not be empty"));
        }
        let content = command.content.trim().to_string();
        if content.is_empty() {
            return Err(AppError::validation("content must not be empty"));
        }

        // Drafts and unpublished posts have no public page to comment on.
        let post = self
            .posts
            .find_by_slug(&command.post_slug)
            .await?
            .filter(|post| post.is_visible())
            .ok_or(AppError::NotFound("post"))?;

        let reply_to = match command.parent_id {
            Some(parent_id) => {
                let parent = self
                    .comments
                    .find_comment(parent_id)
                    .await?
                    .filter(|parent| parent.post_id == post.id)
                    .ok_or_else(|| AppError::validation("parent comment not found"))?;
                Some(parent.author)
            }
            None => None,
        };

        let since = now - self.rate_limit.window;
        let recent = self.comments.count_from_ip_since(&command.ip, since).await?;
        if recent >= self.rate_limit.max_comments {
            return Err(AppError::RateLimited {
                retry_after_secs: self.rate_limit.window.as_secs(),
            });
        }

        let comment = self
            .comments
            .insert_comment(NewCommentParams {
                post_id: post.id,
                author,
                email: command.email.filter(|e| !e.trim().is_empty()),
                content: ammonia::clean(&content),
                ip: command.ip,
                created_at: now,
                parent_id: command.parent_id,
                reply_to,
            })
            .await?;

        // Regenerated immediately even though the comment is still pending;
        // the page embeds comment state, and approval will regenerate again.
        self.queue
            .publish_plan(RegenPlan::for_comment_change(&post.slug));

        Ok(comment)
    }

    pub async fn list(
        &self,
        approved: Option<bool>,
        page: PageRequest,
    ) -> Result<Page<CommentRecord>, AppError> {
        Ok(self.comments.list_comments(approved, page).await?)
    }

    pub async fn set_approved(
        &self,
        id: Uuid,
        approved: bool,
    ) -> Result<CommentRecord, AppError> {
        let comment = self.comments.set_approved(id, approved).await?;
        self.regenerate_owning(comment.post_id).await?;
        Ok(comment)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let comment = self
            .comments
            .find_comment(id)
            .await?
            .ok_or(AppError::NotFound("comment"))?;
        self.comments.delete_comment(id).await?;
        self.regenerate_owning(comment.post_id).await?;
        Ok(())
    }

    async fn regenerate_owning(&self, post_id: Uuid) -> Result<(), AppError> {
        if let Some(post) = self.posts.find_by_id(post_id).await? {
            self.queue
                .publish_plan(RegenPlan::for_comment_change(&post.slug));
        }
        Ok(())
    }
}
