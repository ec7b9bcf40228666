use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;

use crate::application::error::AppError;

use crate::infra::http::state::AppState;

pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.posts_repo.category_counts().await?))
}

pub async fn list_tags(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.posts_repo.tag_counts().await?))
}
