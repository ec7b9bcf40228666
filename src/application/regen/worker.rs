//! Cascade execution.
//!
//! The worker drains the queue and refreshes one cached page per task.
//! Failures are logged and counted per post; they never abort the batch and
//! never surface to the HTTP caller, because the relational store is the
//! source of truth and a full rebuild can always repair drift.

use std::sync::Arc;

use futures::TryStreamExt;
use metrics::counter;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::application::blobs::{BlobError, BlobStore, HTML_CONTENT_TYPE, post_page_key};
use crate::application::render::{PostPageContext, RenderError, render_post_page};
use crate::application::repos::{CommentsRepo, PostsRepo, RepoError, SettingsRepo};
use crate::domain::entities::PostRecord;

use super::queue::{RegenQueue, RegenTask};

pub const REGEN_SUCCESS_COUNTER: &str = "lamina_regen_success_total";
pub const REGEN_FAILURE_COUNTER: &str = "lamina_regen_failure_total";

const DRAIN_BATCH_SIZE: usize = 32;

#[derive(Debug, Error)]
enum RegenError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Blob(#[from] BlobError),
}

pub struct RegenWorker {
    posts: Arc<dyn PostsRepo>,
    comments: Arc<dyn CommentsRepo>,
    settings: Arc<dyn SettingsRepo>,
    blobs: Arc<dyn BlobStore>,
}

impl RegenWorker {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        comments: Arc<dyn CommentsRepo>,
        settings: Arc<dyn SettingsRepo>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            posts,
            comments,
            settings,
            blobs,
        }
    }

    /// Background loop: drain, then sleep until the next publish.
    pub async fn run(self: Arc<Self>, queue: Arc<RegenQueue>) {
        loop {
            self.drain(&queue).await;
            queue.wait().await;
        }
    }

    /// Process everything currently queued. Tests call this directly to make
    /// cascade completion synchronous.
    pub async fn drain(&self, queue: &RegenQueue) {
        loop {
            let tasks = queue.drain_batch(DRAIN_BATCH_SIZE);
            if tasks.is_empty() {
                return;
            }

            for task in tasks {
                match self.process(&task).await {
                    Ok(()) => {
                        counter!(REGEN_SUCCESS_COUNTER).increment(1);
                    }
                    Err(err) => {
                        counter!(REGEN_FAILURE_COUNTER).increment(1);
                        warn!(task = ?task, error = %err, "page regeneration failed");
                    }
                }
            }
        }
    }

    /// Refresh one page outside the queue. Serving uses this to repair a
    /// missing blob for a post that should have one.
    pub async fn ensure_fresh(&self, slug: &str) {
        if let Err(err) = self.refresh_slug(slug).await {
            counter!(REGEN_FAILURE_COUNTER).increment(1);
            warn!(slug = %slug, error = %err, "on-demand refresh failed");
        }
    }

    async fn process(&self, task: &RegenTask) -> Result<(), RegenError> {
        match task {
            RegenTask::RenderPost { slug } => self.refresh_slug(slug).await,
            RegenTask::DeleteBlob { slug } => {
                self.blobs.delete(&post_page_key(slug)).await?;
                debug!(slug = %slug, "cached page removed");
                Ok(())
            }
            RegenTask::RebuildAll => self.rebuild_all().await,
        }
    }

    /// Make the cached page for `slug` match authoritative state: render it
    /// when the post is visible, remove it when the post is gone, hidden or
    /// back in draft.
    async fn refresh_slug(&self, slug: &str) -> Result<(), RegenError> {
        match self.posts.find_by_slug(slug).await? {
            Some(post) if post.is_visible() => self.render_to_blob(&post).await,
            _ => {
                self.blobs.delete(&post_page_key(slug)).await?;
                debug!(slug = %slug, "post not visible, cached page removed");
                Ok(())
            }
        }
    }

    async fn rebuild_all(&self) -> Result<(), RegenError> {
        // Drain the stream before rendering; render_to_blob runs its own
        // queries and must not contend with an open row cursor.
        let posts: Vec<PostRecord> = self.posts.stream_visible().try_collect().await?;
        info!(count = posts.len(), "full rebuild started");

        for post in posts {
            if let Err(err) = self.render_to_blob(&post).await {
                counter!(REGEN_FAILURE_COUNTER).increment(1);
                warn!(slug = %post.slug, error = %err, "rebuild skipped post");
            }
        }
        Ok(())
    }

    async fn render_to_blob(&self, post: &PostRecord) -> Result<(), RegenError> {
        let neighbors = self.posts.neighbors_of(post.published_at, post.id).await?;
        let comments = self.comments.list_approved_for_post(post.id).await?;
        let settings = self.settings.load_settings().await?;

        let html = render_post_page(&PostPageContext {
            post,
            prev: neighbors.prev.as_ref(),
            next: neighbors.next.as_ref(),
            comments: &comments,
            settings: &settings,
            year: OffsetDateTime::now_utc().year(),
        })?;

        self.blobs
            .put(&post_page_key(&post.slug), HTML_CONTENT_TYPE, html.into())
            .await?;
        debug!(slug = %post.slug, "cached page refreshed");
        Ok(())
    }
}
