use axum::Json;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::repos::PageRequest;

use super::models::ListQuery;
use crate::infra::http::state::AppState;

pub async fn list_images(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = state
        .images
        .list(PageRequest::new(
            query.page.unwrap_or(1),
            query.per_page.unwrap_or(20),
        ))
        .await?;
    Ok(Json(page))
}

/// Multipart upload; the image travels in a field named `file`.
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::validation(format!("malformed multipart body: {err}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::validation("file field must carry a file name"))?;
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|err| AppError::validation(format!("upload truncated: {err}")))?;

        let image = state.images.upload(file_name, content_type, bytes).await?;
        return Ok((StatusCode::CREATED, Json(image)));
    }

    Err(AppError::validation("multipart body is missing a `file` field"))
}

pub async fn delete_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.images.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
