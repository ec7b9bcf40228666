//! Authenticated admin API. Every route sits behind HTTP basic auth.

mod blacklist;
mod comments;
mod images;
mod links;
mod maintenance;
mod models;
mod posts;
mod settings;
mod taxonomy;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};

use super::middleware::require_admin;
use super::state::AppState;

pub fn api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/posts",
            get(posts::list_posts).post(posts::create_post),
        )
        .route(
            "/api/posts/{id}",
            get(posts::get_post)
                .put(posts::update_post)
                .delete(posts::delete_post),
        )
        .route("/api/comments", get(comments::list_comments))
        .route(
            "/api/comments/{id}",
            axum::routing::patch(comments::moderate_comment).delete(comments::delete_comment),
        )
        .route("/api/images", get(images::list_images))
        .route("/api/images/{id}", delete(images::delete_image))
        .route("/api/upload-image", post(images::upload_image))
        .route(
            "/api/links",
            get(links::list_links).post(links::create_link),
        )
        .route(
            "/api/links/{id}",
            axum::routing::put(links::update_link).delete(links::delete_link),
        )
        .route(
            "/api/settings",
            get(settings::get_settings).put(settings::update_settings),
        )
        .route(
            "/api/ip-blacklist",
            get(blacklist::list_entries).post(blacklist::create_entry),
        )
        .route("/api/ip-blacklist/{id}", delete(blacklist::delete_entry))
        .route("/api/categories", get(taxonomy::list_categories))
        .route("/api/tags", get(taxonomy::list_tags))
        .route("/api/rebuild-all", post(maintenance::rebuild_all))
        .route("/api/statistics", get(maintenance::statistics))
        .layer(axum_middleware::from_fn_with_state(state, require_admin))
}
