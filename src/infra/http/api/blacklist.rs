use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::error::AppError;

use super::models::BlacklistCreateRequest;
use crate::infra::http::state::AppState;

pub async fn list_entries(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.blacklist_repo.list_entries().await?))
}

pub async fn create_entry(
    State(state): State<AppState>,
    Json(request): Json<BlacklistCreateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let pattern = request.ip_pattern.trim();
    if pattern.is_empty() {
        return Err(AppError::validation("ip_pattern must not be empty"));
    }
    // Wildcards are prefix-only.
    if let Some(index) = pattern.find('*')
        && index != pattern.len() - 1
    {
        return Err(AppError::validation(
            "ip_pattern may only end with a `*` wildcard",
        ));
    }

    let entry = state
        .blacklist_repo
        .insert_entry(pattern.to_string(), request.reason, request.expires_at)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn delete_entry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.blacklist_repo.delete_entry(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
