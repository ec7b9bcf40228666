//! Unauthenticated surface: cached post pages, listing pages, the comment
//! form target, syndication endpoints and media.

use axum::Router;
use axum::extract::{Form, Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use serde::Deserialize;
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::application::blobs::{HTML_CONTENT_TYPE, image_key, post_page_key};
use crate::application::comments::SubmitCommentCommand;
use crate::application::error::AppError;

use super::middleware::client_ip;
use super::state::AppState;

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/blog/{slug}", get(post_page))
        .route("/blog/{slug}/comments", axum::routing::post(submit_comment))
        .route("/search", get(search))
        .route("/category/{name}", get(category))
        .route("/tags/{name}", get(tag))
        .route("/archive", get(archive))
        .route("/feed.xml", get(feed))
        .route("/sitemap.xml", get(sitemap))
        .route("/robots.txt", get(robots))
        .route("/media/{*path}", get(media))
        .route("/healthz", get(healthz))
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    #[serde(default)]
    page: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
    #[serde(default)]
    page: Option<u32>,
}

async fn index(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, AppError> {
    let html = state.site.index_page(query.page.unwrap_or(1)).await?;
    Ok(Html(html))
}

async fn post_page(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let post = state
        .posts_repo
        .find_by_slug(&slug)
        .await?
        .filter(|post| post.is_visible())
        .ok_or(AppError::NotFound("post"))?;

    // View counting must never block serving.
    let ip = client_ip(&headers);
    if let Err(err) = state
        .stats_repo
        .record_view(post.id, &ip, OffsetDateTime::now_utc())
        .await
    {
        warn!(slug = %slug, error = %err, "view recording failed");
    }

    let key = post_page_key(&slug);
    let bytes = match state.blobs.get(&key).await? {
        Some(bytes) => bytes,
        None => {
            // Cache drift: the store says the post is visible but no page
            // exists. Repair it inline.
            state.worker.ensure_fresh(&slug).await;
            state
                .blobs
                .get(&key)
                .await?
                .ok_or_else(|| AppError::unexpected("cached page unavailable after refresh"))?
        }
    };

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, HTML_CONTENT_TYPE)],
        bytes,
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
struct CommentForm {
    author: String,
    #[serde(default)]
    email: Option<String>,
    content: String,
    #[serde(default)]
    parent_id: Option<String>,
}

async fn submit_comment(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    Form(form): Form<CommentForm>,
) -> Result<Response, AppError> {
    let parent_id = match form.parent_id.as_deref().filter(|raw| !raw.is_empty()) {
        Some(raw) => Some(
            Uuid::parse_str(raw)
                .map_err(|_| AppError::validation("parent_id must be a UUID"))?,
        ),
        None => None,
    };

    state
        .comments
        .submit(SubmitCommentCommand {
            post_slug: slug.clone(),
            author: form.author,
            email: form.email.filter(|email| !email.trim().is_empty()),
            content: form.content,
            ip: client_ip(&headers),
            parent_id,
        })
        .await?;

    Ok(Redirect::to(&format!("/blog/{slug}")).into_response())
}

async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Html<String>, AppError> {
    let html = state
        .site
        .search_page(&query.q, query.page.unwrap_or(1))
        .await?;
    Ok(Html(html))
}

async fn category(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, AppError> {
    let html = state
        .site
        .category_page(&name, query.page.unwrap_or(1))
        .await?;
    Ok(Html(html))
}

async fn tag(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, AppError> {
    let html = state.site.tag_page(&name, query.page.unwrap_or(1)).await?;
    Ok(Html(html))
}

async fn archive(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    Ok(Html(state.site.archive_page().await?))
}

async fn feed(State(state): State<AppState>) -> Result<Response, AppError> {
    let xml = state.site.feed_xml().await?;
    Ok((
        [(header::CONTENT_TYPE, "application/rss+xml; charset=utf-8")],
        xml,
    )
        .into_response())
}

async fn sitemap(State(state): State<AppState>) -> Result<Response, AppError> {
    let xml = state.site.sitemap_xml().await?;
    Ok(([(header::CONTENT_TYPE, "application/xml; charset=utf-8")], xml).into_response())
}

async fn robots(State(state): State<AppState>) -> Result<Response, AppError> {
    let body = state.site.robots_txt().await?;
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response())
}

async fn media(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, AppError> {
    let bytes = state
        .blobs
        .get(&image_key(&path))
        .await?
        .ok_or(AppError::NotFound("media object"))?;

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    Ok((
        [(header::CONTENT_TYPE, mime.essence_str().to_string())],
        bytes,
    )
        .into_response())
}

async fn healthz(State(state): State<AppState>) -> Response {
    match state.repositories.health_check().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            warn!(error = %err, "health check failed");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}
