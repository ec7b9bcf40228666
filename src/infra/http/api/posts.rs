use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::posts::{CreatePostCommand, UpdatePostCommand};
use crate::application::repos::PageRequest;

use super::models::{ListQuery, PostCreateRequest, PostUpdateRequest};
use crate::infra::http::state::AppState;

pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = state
        .posts
        .list(PageRequest::new(
            query.page.unwrap_or(1),
            query.per_page.unwrap_or(20),
        ))
        .await?;
    Ok(Json(page))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.posts.get(id).await?))
}

pub async fn create_post(
    State(state): State<AppState>,
    Json(request): Json<PostCreateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let post = state
        .posts
        .create(CreatePostCommand {
            title: request.title,
            content: request.content,
            category: request.category,
            tags: request.tags,
            published_at: request.published_at,
            is_published: request.is_published,
            is_draft: request.is_draft,
            is_pinned: request.is_pinned,
            feature_image: request.feature_image,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<PostUpdateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let post = state
        .posts
        .update(
            id,
            UpdatePostCommand {
                title: request.title,
                content: request.content,
                category: request.category,
                tags: request.tags,
                published_at: request.published_at,
                is_published: request.is_published,
                is_draft: request.is_draft,
                is_pinned: request.is_pinned,
                feature_image: request.feature_image,
            },
        )
        .await?;
    Ok(Json(post))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.posts.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
