//! Shared harness: a full application wired against an in-memory database
//! and an in-memory blob store, with a synchronously drainable queue.

use std::sync::Arc;

use axum::Router;
use lamina::application::blobs::{BlobStore, post_page_key};
use lamina::application::comments::{CommentService, RateLimitPolicy};
use lamina::application::images::ImageService;
use lamina::application::posts::{CreatePostCommand, PostService};
use lamina::application::regen::{RegenQueue, RegenWorker};
use lamina::application::site::SiteService;
use lamina::config::AdminSettings;
use lamina::domain::entities::PostRecord;
use lamina::infra::blob::MemoryBlobStore;
use lamina::infra::db::SqliteRepositories;
use lamina::infra::http::{AppState, build_router};
use time::OffsetDateTime;

pub const ADMIN_USER: &str = "admin";
pub const ADMIN_PASSWORD: &str = "test-password";

pub struct TestApp {
    pub state: AppState,
    pub queue: Arc<RegenQueue>,
    pub worker: Arc<RegenWorker>,
    pub blobs: Arc<MemoryBlobStore>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_rate_limit(RateLimitPolicy::default()).await
    }

    pub async fn with_rate_limit(rate_limit: RateLimitPolicy) -> Self {
        // One connection: every handle must observe the same in-memory
        // database.
        let pool = SqliteRepositories::connect("sqlite::memory:", 1)
            .await
            .expect("connect");
        SqliteRepositories::run_migrations(&pool)
            .await
            .expect("migrate");
        let repositories = SqliteRepositories::new(pool);

        let blobs = Arc::new(MemoryBlobStore::new());
        let queue = Arc::new(RegenQueue::new());

        let posts_repo: Arc<SqliteRepositories> = Arc::new(repositories.clone());
        let worker = Arc::new(RegenWorker::new(
            posts_repo.clone(),
            Arc::new(repositories.clone()),
            Arc::new(repositories.clone()),
            blobs.clone(),
        ));

        let posts = Arc::new(PostService::new(
            posts_repo.clone(),
            Arc::new(repositories.clone()),
            Arc::new(repositories.clone()),
            queue.clone(),
        ));
        let comments = Arc::new(CommentService::new(
            Arc::new(repositories.clone()),
            posts_repo.clone(),
            Arc::new(repositories.clone()),
            queue.clone(),
            rate_limit,
        ));
        let images = Arc::new(ImageService::new(
            Arc::new(repositories.clone()),
            blobs.clone(),
        ));
        let site = Arc::new(SiteService::new(
            posts_repo.clone(),
            Arc::new(repositories.clone()),
            Arc::new(repositories.clone()),
        ));

        let state = AppState {
            posts,
            comments,
            images,
            site,
            posts_repo,
            comments_repo: Arc::new(repositories.clone()),
            images_repo: Arc::new(repositories.clone()),
            links_repo: Arc::new(repositories.clone()),
            settings_repo: Arc::new(repositories.clone()),
            blacklist_repo: Arc::new(repositories.clone()),
            stats_repo: Arc::new(repositories.clone()),
            blobs: blobs.clone(),
            worker: worker.clone(),
            repositories,
            admin: Arc::new(AdminSettings {
                username: ADMIN_USER.to_string(),
                password: ADMIN_PASSWORD.to_string(),
            }),
        };

        Self {
            state,
            queue,
            worker,
            blobs,
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Process every queued regeneration task.
    pub async fn drain(&self) {
        self.worker.drain(&self.queue).await;
    }

    /// Create a published post at the given instant and complete its
    /// cascade.
    pub async fn publish_post(&self, title: &str, published_at: OffsetDateTime) -> PostRecord {
        let post = self
            .state
            .posts
            .create(CreatePostCommand {
                title: title.to_string(),
                content: format!("Body of {title}."),
                category: None,
                tags: Vec::new(),
                published_at: Some(published_at),
                is_published: Some(true),
                is_draft: Some(false),
                is_pinned: None,
                feature_image: None,
            })
            .await
            .expect("create post");
        self.drain().await;
        post
    }

    pub async fn page_html(&self, slug: &str) -> Option<String> {
        self.blobs
            .get(&post_page_key(slug))
            .await
            .expect("blob get")
            .map(|bytes| String::from_utf8(bytes.to_vec()).expect("utf8"))
    }

    /// Slugs that currently have a cached page.
    pub fn cached_slugs(&self) -> Vec<String> {
        let mut slugs: Vec<String> = self
            .blobs
            .keys()
            .into_iter()
            .filter_map(|key| {
                key.strip_prefix("posts/")
                    .and_then(|rest| rest.strip_suffix(".html"))
                    .map(str::to_string)
            })
            .collect();
        slugs.sort();
        slugs
    }
}
