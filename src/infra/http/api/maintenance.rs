use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use crate::application::error::AppError;

use crate::infra::http::state::AppState;

/// Queue a regeneration of every visible post page.
pub async fn rebuild_all(State(state): State<AppState>) -> impl IntoResponse {
    state.posts.rebuild_all();
    (StatusCode::ACCEPTED, Json(json!({ "status": "queued" })))
}

pub async fn statistics(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.stats_repo.statistics().await?))
}
