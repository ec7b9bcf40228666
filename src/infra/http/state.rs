use std::sync::Arc;

use crate::application::blobs::BlobStore;
use crate::application::comments::CommentService;
use crate::application::images::ImageService;
use crate::application::posts::PostService;
use crate::application::regen::RegenWorker;
use crate::application::repos::{
    BlacklistRepo, CommentsRepo, ImagesRepo, LinksRepo, PostsRepo, SettingsRepo, StatsRepo,
};
use crate::application::site::SiteService;
use crate::config::AdminSettings;
use crate::infra::db::SqliteRepositories;

/// Shared handler state. All services are cheap to clone through the Arc.
#[derive(Clone)]
pub struct AppState {
    pub posts: Arc<PostService>,
    pub comments: Arc<CommentService>,
    pub images: Arc<ImageService>,
    pub site: Arc<SiteService>,
    pub posts_repo: Arc<dyn PostsRepo>,
    pub comments_repo: Arc<dyn CommentsRepo>,
    pub images_repo: Arc<dyn ImagesRepo>,
    pub links_repo: Arc<dyn LinksRepo>,
    pub settings_repo: Arc<dyn SettingsRepo>,
    pub blacklist_repo: Arc<dyn BlacklistRepo>,
    pub stats_repo: Arc<dyn StatsRepo>,
    pub blobs: Arc<dyn BlobStore>,
    pub worker: Arc<RegenWorker>,
    pub repositories: SqliteRepositories,
    pub admin: Arc<AdminSettings>,
}
