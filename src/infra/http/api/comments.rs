use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::repos::PageRequest;

use super::models::{CommentListQuery, CommentModerationRequest};
use crate::infra::http::state::AppState;

pub async fn list_comments(
    State(state): State<AppState>,
    Query(query): Query<CommentListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = state
        .comments
        .list(
            query.approved,
            PageRequest::new(query.page.unwrap_or(1), query.per_page.unwrap_or(20)),
        )
        .await?;
    Ok(Json(page))
}

pub async fn moderate_comment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<CommentModerationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let comment = state.comments.set_approved(id, request.approved).await?;
    Ok(Json(comment))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.comments.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
